//! Reconciles a freshly normalized record set with the rendered graph.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use super::identity::IdentityTracker;
use super::layout::{self, Adjacency};
use super::normalize::Normalized;
use super::recency;
use super::state::GraphStore;
use super::types::{Edge, EdgeKind, GraphSnapshot, Node, ROOT_ID};
use crate::config::LayoutParams;
use crate::error::{TopologyError, TopologyResult};

/// What one applied cycle changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
	/// Nodes seen for the first time in this view.
	pub added: usize,
	/// Nodes seen before, absent last cycle, back now.
	pub reappeared: usize,
	/// Nodes carried over from the previous cycle.
	pub retained: usize,
	/// Nodes in the previous cycle but not in this one.
	pub removed: usize,
	pub edges: usize,
	pub synthetic_edges: usize,
	/// Nodes the layout engine placed this cycle.
	pub placed: usize,
	/// Records the normalizer dropped.
	pub dropped: usize,
}

/// Add root edges until every node reaches root over (undirected) edges.
///
/// Unreachable nodes without an incoming peer link go first, then the rest
/// (cycles), each group by id. A node made reachable by an earlier insertion
/// gets no edge of its own.
pub fn connect_to_root(nodes: &[Node], explicit: Vec<Edge>) -> Vec<Edge> {
	let synthetic = {
		let adjacency = Adjacency::undirected(&explicit);
		let has_incoming: HashSet<&str> = explicit
			.iter()
			.filter(|e| e.source != ROOT_ID)
			.map(|e| e.target.as_str())
			.collect();

		let mut reachable = HashSet::new();
		adjacency.flood(ROOT_ID, &mut reachable);

		let mut candidates: Vec<&Node> =
			nodes.iter().filter(|n| !reachable.contains(n.id.as_str())).collect();
		candidates.sort_by(|a, b| {
			(has_incoming.contains(a.id.as_str()), &a.id).cmp(&(has_incoming.contains(b.id.as_str()), &b.id))
		});

		let mut synthetic = Vec::new();
		for node in candidates {
			if reachable.contains(node.id.as_str()) {
				continue;
			}
			let mut edge = Edge::new(ROOT_ID, &node.id, EdgeKind::SyntheticRoot);
			edge.driven_by = node.metadata.last_checkin.clone();
			synthetic.push(edge);
			adjacency.flood(&node.id, &mut reachable);
		}
		synthetic
	};

	let mut edges = explicit;
	edges.extend(synthetic);
	edges
}

/// Build the next snapshot from `fresh`, carrying positions forward from
/// `previous` and stamping first-seen/entrance metadata. Positions of nodes
/// not in `previous` stay unassigned for the layout engine.
pub fn merge(
	previous: Option<&GraphSnapshot>,
	fresh: Normalized,
	tracker: &mut IdentityTracker,
	now: DateTime<Utc>,
	activity_window: Duration,
) -> (GraphSnapshot, CycleSummary) {
	let mut summary = CycleSummary {
		dropped: fresh.dropped,
		..Default::default()
	};
	let prior: HashMap<&str, &Node> = previous
		.map(|p| p.nodes.iter().map(|n| (n.id.as_str(), n)).collect())
		.unwrap_or_default();

	let mut nodes = fresh.nodes;
	let mut newcomers = Vec::new();
	for (i, node) in nodes.iter_mut().enumerate() {
		node.freshness = recency::evaluate(node.metadata.last_checkin.as_deref(), now);
		if let Some(old) = prior.get(node.id.as_str()) {
			node.position = old.position;
			node.first_seen = false;
			node.entrance_order = None;
			summary.retained += 1;
		} else if tracker.is_new(&node.id) {
			node.first_seen = true;
			newcomers.push(i);
			summary.added += 1;
		} else {
			summary.reappeared += 1;
		}
	}
	newcomers.sort_by_key(|&i| (nodes[i].display_id, nodes[i].id.clone()));
	for (rank, &i) in newcomers.iter().enumerate() {
		nodes[i].entrance_order = Some(rank as u32);
	}

	let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
	summary.removed = prior.keys().filter(|id| !present.contains(*id)).count();

	let mut edges = connect_to_root(&nodes, fresh.links);
	for edge in &mut edges {
		edge.active = recency::is_active(edge.driven_by.as_deref(), now, activity_window);
	}
	summary.edges = edges.len();
	summary.synthetic_edges = edges.iter().filter(|e| e.kind == EdgeKind::SyntheticRoot).count();

	(GraphSnapshot { nodes, edges }, summary)
}

/// The only writer of the graph store's node/edge state. Owns the identity
/// tracker, so it lives and dies with the view.
#[derive(Debug)]
pub struct MergeEngine {
	tracker: IdentityTracker,
	layout: LayoutParams,
	activity_window: Duration,
}

impl MergeEngine {
	pub fn new(layout: LayoutParams, activity_window: Duration) -> Self {
		Self {
			tracker: IdentityTracker::new(),
			layout,
			activity_window,
		}
	}

	pub fn tracker(&self) -> &IdentityTracker {
		&self.tracker
	}

	/// Merge, lay out and commit one cycle. With no root anchor nothing is
	/// touched and the store keeps its previous graph.
	pub fn apply(
		&mut self,
		store: &mut GraphStore,
		fresh: Normalized,
		now: DateTime<Utc>,
	) -> TopologyResult<CycleSummary> {
		let root = store.root().ok_or(TopologyError::RootMissing)?;
		let (mut next, mut summary) =
			merge(store.snapshot(), fresh, &mut self.tracker, now, self.activity_window);
		summary.placed = layout::layout(&mut next.nodes, &next.edges, Some(root), &self.layout)?;
		store.commit(next);
		Ok(summary)
	}
}
