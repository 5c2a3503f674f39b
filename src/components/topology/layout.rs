//! Fixed two-tier placement anchored to root.
//!
//! Only nodes without a position are placed. Tier 1 (nodes sharing an edge
//! with root) sits on a band one `tier_gap` below root, sorted by id and
//! centred under it. Everything else sits one more `tier_gap` lower in
//! breadth-first discovery order. A new node never displaces a placed one:
//! if its slot is taken it slides right by whole spacings until free.

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{Edge, Node, Position, ROOT_ID};
use crate::config::LayoutParams;
use crate::error::{TopologyError, TopologyResult};

/// Ids of nodes directly linked to root.
pub fn tier_one(edges: &[Edge]) -> HashSet<&str> {
	edges
		.iter()
		.filter_map(|e| {
			if e.source == ROOT_ID {
				Some(e.target.as_str())
			} else if e.target == ROOT_ID {
				Some(e.source.as_str())
			} else {
				None
			}
		})
		.collect()
}

/// Undirected neighbour lists over a set of edges.
pub struct Adjacency<'a> {
	neighbors: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
	/// Index `edges` in both directions.
	pub fn undirected(edges: &'a [Edge]) -> Self {
		let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
		for e in edges {
			neighbors.entry(&e.source).or_default().push(&e.target);
			neighbors.entry(&e.target).or_default().push(&e.source);
		}
		Self { neighbors }
	}

	/// Breadth-first walk from `start` that marks everything it reaches in
	/// `visited` and never re-enters ids already there. Returns the newly
	/// reached ids in discovery order, `start` excluded.
	pub fn flood(&self, start: &'a str, visited: &mut HashSet<&'a str>) -> Vec<&'a str> {
		visited.insert(start);
		let mut order = Vec::new();
		let mut queue = VecDeque::from([start]);
		while let Some(id) = queue.pop_front() {
			for &next in self.neighbors.get(id).into_iter().flatten() {
				if visited.insert(next) {
					order.push(next);
					queue.push_back(next);
				}
			}
		}
		order
	}
}

/// Node ids in breadth-first order from root, treating edges as undirected.
pub fn discovery_order(edges: &[Edge]) -> Vec<&str> {
	Adjacency::undirected(edges).flood(ROOT_ID, &mut HashSet::new())
}

/// Place every unpositioned node. Returns how many were placed.
pub fn layout(
	nodes: &mut [Node],
	edges: &[Edge],
	root: Option<Position>,
	params: &LayoutParams,
) -> TopologyResult<usize> {
	let root = root.ok_or(TopologyError::RootMissing)?;
	if nodes.is_empty() {
		return Ok(0);
	}

	let index: HashMap<String, usize> =
		nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
	let tier_one_ids = tier_one(edges);

	let mut first: Vec<usize> = tier_one_ids.iter().filter_map(|id| index.get(*id).copied()).collect();
	first.sort_by(|&a, &b| nodes[a].id.cmp(&nodes[b].id));

	let mut second: Vec<usize> = discovery_order(edges)
		.into_iter()
		.filter(|id| !tier_one_ids.contains(id))
		.filter_map(|id| index.get(id).copied())
		.collect();
	// Not reachable from root at all; keep them visible rather than unplaced.
	let listed: HashSet<usize> = first.iter().chain(second.iter()).copied().collect();
	second.extend((0..nodes.len()).filter(|i| !listed.contains(i)));

	let mut placed = place_band(nodes, &first, root.x, root.y + params.tier_gap, params);
	placed += place_band(nodes, &second, root.x, root.y + 2.0 * params.tier_gap, params);
	Ok(placed)
}

fn place_band(nodes: &mut [Node], members: &[usize], center_x: f64, y: f64, params: &LayoutParams) -> usize {
	let half_gap = params.tier_gap / 2.0;
	let mut occupied: Vec<f64> = nodes
		.iter()
		.filter_map(|n| n.position)
		.filter(|p| (p.y - y).abs() < half_gap)
		.map(|p| p.x)
		.collect();

	let count = members.len();
	let mut placed = 0;
	for (slot, &idx) in members.iter().enumerate() {
		if nodes[idx].position.is_some() {
			continue;
		}
		let offset = slot as f64 - (count as f64 - 1.0) / 2.0;
		let mut x = center_x + offset * params.spacing;
		while occupied.iter().any(|&ox| (ox - x).abs() < params.spacing / 2.0) {
			x += params.spacing;
		}
		occupied.push(x);
		nodes[idx].position = Some(Position::new(x, y));
		placed += 1;
	}
	placed
}
