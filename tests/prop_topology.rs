use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use topology_canvas::components::topology::types::{AgentRecord, LinkRecord, RawId, edge_id};
use topology_canvas::components::topology::{GraphSnapshot, Position, ROOT_ID, RecordBatch, TopologySession};
use topology_canvas::config::TopologyConfig;

fn now() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn record(id: u8) -> AgentRecord {
	AgentRecord {
		id: Some(RawId::Text(format!("agent-{id}"))),
		display_id: Some(RawId::Number(i64::from(id))),
		..Default::default()
	}
}

fn link(src: u8, dst: u8) -> LinkRecord {
	LinkRecord {
		source_id: Some(RawId::Text(format!("agent-{src}"))),
		destination_id: Some(RawId::Text(format!("agent-{dst}"))),
		..Default::default()
	}
}

/// One poll: a subset of 12 possible agents plus random links among them.
fn cycle_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<(u8, u8)>)> {
	(
		proptest::collection::btree_set(0u8..12, 0..12),
		proptest::collection::vec((0u8..12, 0u8..12), 0..16),
	)
		.prop_map(|(ids, links)| (ids.into_iter().collect(), links))
}

fn to_batch((ids, links): &(Vec<u8>, Vec<(u8, u8)>)) -> RecordBatch {
	RecordBatch {
		agents: ids.iter().copied().map(record).collect(),
		links: links.iter().map(|&(s, d)| link(s, d)).collect(),
	}
}

fn run(cycles: &[(Vec<u8>, Vec<(u8, u8)>)]) -> Vec<GraphSnapshot> {
	let mut session = TopologySession::new(TopologyConfig::default(), 800.0, 600.0);
	cycles
		.iter()
		.map(|c| {
			let ticket = session.begin_poll().unwrap();
			session.on_poll_result(ticket, Ok(to_batch(c)), now());
			session.store().snapshot().cloned().unwrap_or_default()
		})
		.collect()
}

fn reaches_root(snapshot: &GraphSnapshot) -> HashSet<String> {
	let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
	for e in &snapshot.edges {
		adjacency.entry(&e.source).or_default().push(&e.target);
		adjacency.entry(&e.target).or_default().push(&e.source);
	}
	let mut seen = HashSet::from([ROOT_ID.to_string()]);
	let mut queue = VecDeque::from([ROOT_ID]);
	while let Some(id) = queue.pop_front() {
		for &next in adjacency.get(id).into_iter().flatten() {
			if seen.insert(next.to_string()) {
				queue.push_back(next);
			}
		}
	}
	seen
}

// ---------------------------------------------------------------------------
// Property: positions never change for nodes present in consecutive cycles
// ---------------------------------------------------------------------------

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn positions_are_stable(cycles in proptest::collection::vec(cycle_strategy(), 1..6)) {
		let snapshots = run(&cycles);
		for pair in snapshots.windows(2) {
			for node in &pair[1].nodes {
				if let Some(prev) = pair[0].node(&node.id) {
					prop_assert_eq!(node.position, prev.position, "node {} moved", node.id);
				}
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Property: first_seen is true in at most one cycle per id
// ---------------------------------------------------------------------------

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn first_seen_at_most_once(cycles in proptest::collection::vec(cycle_strategy(), 1..8)) {
		let snapshots = run(&cycles);
		let mut flagged: HashMap<String, usize> = HashMap::new();
		for snap in &snapshots {
			for node in snap.nodes.iter().filter(|n| n.first_seen) {
				*flagged.entry(node.id.clone()).or_default() += 1;
			}
		}
		prop_assert!(flagged.values().all(|&n| n == 1));
	}
}

// ---------------------------------------------------------------------------
// Property: every rendered node reaches root and has a position
// ---------------------------------------------------------------------------

proptest! {
	#![proptest_config(ProptestConfig::with_cases(300))]

	#[test]
	fn every_node_reaches_root(cycle in cycle_strategy()) {
		let snapshot = run(&[cycle]).pop().unwrap_or_default();
		let reachable = reaches_root(&snapshot);
		for node in &snapshot.nodes {
			prop_assert!(reachable.contains(&node.id), "{} cut off from root", node.id);
			prop_assert!(node.position.is_some());
		}
	}
}

// ---------------------------------------------------------------------------
// Property: nodes on the same band never share a slot
// ---------------------------------------------------------------------------

proptest! {
	#![proptest_config(ProptestConfig::with_cases(200))]

	#[test]
	fn no_two_nodes_share_a_position(cycles in proptest::collection::vec(cycle_strategy(), 1..5)) {
		let snapshots = run(&cycles);
		let last = snapshots.last().unwrap();
		let positions: Vec<Position> = last.nodes.iter().filter_map(|n| n.position).collect();
		for (i, a) in positions.iter().enumerate() {
			for b in &positions[i + 1..] {
				prop_assert!(a != b, "two nodes at {:?}", a);
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Property: edge ids are a pure, injective function of the endpoint pair
// ---------------------------------------------------------------------------

proptest! {
	#[test]
	fn edge_ids_are_idempotent(src in "[a-z0-9-]{1,12}", dst in "[a-z0-9-]{1,12}") {
		prop_assert_eq!(edge_id(&src, &dst), edge_id(&src, &dst));
		if src != dst {
			prop_assert_ne!(edge_id(&src, &dst), edge_id(&dst, &src));
		}
	}

	#[test]
	fn distinct_pairs_get_distinct_edge_ids(
		a in "[ab:>-]{1,6}",
		b in "[ab:>-]{1,6}",
		c in "[ab:>-]{1,6}",
		d in "[ab:>-]{1,6}",
	) {
		if (a.as_str(), b.as_str()) != (c.as_str(), d.as_str()) {
			prop_assert_ne!(edge_id(&a, &b), edge_id(&c, &d));
		}
	}
}
