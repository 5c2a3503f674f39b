//! Raw agent/link records to canonical nodes and explicit edges.

use std::collections::HashSet;

use log::warn;

use super::types::{
	AgentRecord, Edge, EdgeKind, LinkRecord, Node, NodeMetadata, RawId, RawIp, ROOT_ID,
};
use crate::error::{TopologyError, TopologyResult};

/// Output of one normalization pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Normalized {
	/// Unplaced nodes, in record order.
	pub nodes: Vec<Node>,
	/// Explicit edges whose endpoints both resolve.
	pub links: Vec<Edge>,
	/// Records dropped as malformed or unresolvable.
	pub dropped: usize,
}

/// First IP of the field, falling back to the raw text when it is not a JSON list.
pub fn first_ip(raw: Option<&RawIp>) -> String {
	match raw {
		None => String::new(),
		Some(RawIp::List(ips)) => ips.first().cloned().unwrap_or_default(),
		Some(RawIp::Text(text)) => match serde_json::from_str::<Vec<String>>(text) {
			Ok(ips) => ips.into_iter().next().unwrap_or_default(),
			Err(_) => text.clone(),
		},
	}
}

fn display_id(raw: Option<&RawId>) -> TopologyResult<u32> {
	match raw {
		Some(RawId::Number(n)) => u32::try_from(*n).map_err(|_| TopologyError::MissingField("display_id")),
		Some(RawId::Text(s)) => s
			.trim()
			.parse()
			.map_err(|_| TopologyError::MissingField("display_id")),
		None => Err(TopologyError::MissingField("display_id")),
	}
}

/// Build an unplaced node from one agent record.
pub fn normalize_agent(record: &AgentRecord) -> TopologyResult<Node> {
	let id = record
		.id
		.as_ref()
		.and_then(RawId::canonical)
		.ok_or(TopologyError::MissingField("id"))?;
	if id == ROOT_ID {
		return Err(TopologyError::ReservedId(id));
	}
	let display_id = display_id(record.display_id.as_ref())?;

	let text = |v: &Option<String>| v.clone().unwrap_or_default();
	let metadata = NodeMetadata {
		user: text(&record.user),
		host: text(&record.host),
		ip: first_ip(record.ip.as_ref()),
		pid: record.pid,
		domain: text(&record.domain),
		os: text(&record.os),
		architecture: text(&record.architecture),
		integrity_level: record.integrity_level.unwrap_or_default(),
		agent_type: text(&record.agent_type),
		description: text(&record.description),
		last_checkin: record.last_checkin.clone().filter(|s| !s.trim().is_empty()),
	};
	Ok(Node::new(id, display_id, metadata))
}

/// Build an explicit edge from an open link whose endpoints are in `known`
/// (root always resolves). Closed, dangling and self links yield `None`.
pub fn normalize_link(record: &LinkRecord, known: &HashSet<String>) -> Option<Edge> {
	if record.end_timestamp.as_deref().is_some_and(|s| !s.trim().is_empty()) {
		return None;
	}
	let resolve = |raw: &Option<RawId>| {
		raw.as_ref()
			.and_then(RawId::canonical)
			.filter(|id| id == ROOT_ID || known.contains(id))
	};
	let source = resolve(&record.source_id)?;
	let target = resolve(&record.destination_id)?;
	if source == target {
		return None;
	}

	let mut edge = Edge::new(&source, &target, EdgeKind::Explicit);
	edge.label = record.label.clone();
	edge.driven_by = record.timestamp.clone();
	Some(edge)
}

/// Normalize one poll's records. Bad records are logged and counted, never fatal.
pub fn normalize(agents: &[AgentRecord], links: &[LinkRecord]) -> Normalized {
	let mut out = Normalized::default();
	let mut known = HashSet::new();

	for record in agents {
		if record.active == Some(false) {
			out.dropped += 1;
			continue;
		}
		let node = normalize_agent(record).and_then(|node| {
			if known.contains(&node.id) {
				Err(TopologyError::DuplicateId(node.id))
			} else {
				Ok(node)
			}
		});
		match node {
			Ok(node) => {
				known.insert(node.id.clone());
				out.nodes.push(node);
			}
			Err(e) => {
				warn!("dropping agent record: {e}");
				out.dropped += 1;
			}
		}
	}

	let mut edge_ids = HashSet::new();
	for record in links {
		match normalize_link(record, &known) {
			Some(edge) if edge_ids.insert(edge.id.clone()) => out.links.push(edge),
			Some(_) => {}
			None => out.dropped += 1,
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::topology::types::edge_id;

	fn agent(id: &str, display: i64) -> AgentRecord {
		AgentRecord {
			id: Some(RawId::Text(id.into())),
			display_id: Some(RawId::Number(display)),
			..Default::default()
		}
	}

	fn link(src: &str, dst: &str) -> LinkRecord {
		LinkRecord {
			source_id: Some(RawId::Text(src.into())),
			destination_id: Some(RawId::Text(dst.into())),
			..Default::default()
		}
	}

	#[test]
	fn ip_json_list_takes_first() {
		let ip = RawIp::Text(r#"["10.0.0.5","192.168.1.2"]"#.into());
		assert_eq!(first_ip(Some(&ip)), "10.0.0.5");
	}

	#[test]
	fn ip_not_json_falls_back_to_raw() {
		let ip = RawIp::Text("not-json".into());
		assert_eq!(first_ip(Some(&ip)), "not-json");
	}

	#[test]
	fn ip_decoded_and_empty_lists() {
		assert_eq!(first_ip(Some(&RawIp::List(vec!["::1".into()]))), "::1");
		assert_eq!(first_ip(Some(&RawIp::Text("[]".into()))), "");
		assert_eq!(first_ip(None), "");
	}

	#[test]
	fn agent_from_json_with_numeric_ids() {
		let record: AgentRecord = serde_json::from_str(
			r#"{"id": 42, "display_id": "7", "user": "svc", "ip": "[\"10.1.1.1\"]", "integrity_level": 3}"#,
		)
		.unwrap();
		let node = normalize_agent(&record).unwrap();
		assert_eq!(node.id, "42");
		assert_eq!(node.display_id, 7);
		assert_eq!(node.metadata.ip, "10.1.1.1");
		assert!(node.metadata.is_high_integrity());
		assert!(node.position.is_none());
	}

	#[test]
	fn missing_identity_is_dropped() {
		let mut no_id = agent("x", 1);
		no_id.id = None;
		let mut blank = agent("  ", 2);
		blank.display_id = Some(RawId::Number(2));
		let mut no_display = agent("y", 3);
		no_display.display_id = None;

		let out = normalize(&[no_id, blank, no_display, agent("ok", 4)], &[]);
		assert_eq!(out.nodes.len(), 1);
		assert_eq!(out.nodes[0].id, "ok");
		assert_eq!(out.dropped, 3);
	}

	#[test]
	fn reserved_duplicate_and_inactive_are_dropped() {
		let mut inactive = agent("c", 3);
		inactive.active = Some(false);
		let out = normalize(&[agent(ROOT_ID, 1), agent("a", 1), agent("a", 2), inactive], &[]);
		assert_eq!(out.nodes.len(), 1);
		assert_eq!(out.nodes[0].display_id, 1);
		assert_eq!(out.dropped, 3);
	}

	#[test]
	fn links_filtered_by_close_marker_and_endpoints() {
		let mut closed = link("a", "b");
		closed.end_timestamp = Some("2024-01-01T00:00:00Z".into());
		let out = normalize(
			&[agent("a", 1), agent("b", 2)],
			&[link("a", "b"), closed, link("a", "ghost"), link("a", "a"), link(ROOT_ID, "a"), link("a", "b")],
		);
		let ids: Vec<_> = out.links.iter().map(|e| e.id.clone()).collect();
		assert_eq!(ids, vec![edge_id("a", "b"), edge_id(ROOT_ID, "a")]);
		assert!(out.links.iter().all(|e| e.kind == EdgeKind::Explicit));
		assert_eq!(out.dropped, 3);
	}

	#[test]
	fn arrow_in_node_ids_does_not_merge_links() {
		let out = normalize(
			&[agent("a", 1), agent("b->c", 2), agent("a->b", 3), agent("c", 4)],
			&[link("a", "b->c"), link("a->b", "c")],
		);
		assert_eq!(out.links.len(), 2);
		assert_eq!(out.dropped, 0);
		assert_ne!(out.links[0].id, out.links[1].id);
		assert_eq!((out.links[1].source.as_str(), out.links[1].target.as_str()), ("a->b", "c"));
	}

	#[test]
	fn blank_end_timestamp_is_open() {
		let mut open = link("a", "b");
		open.end_timestamp = Some(String::new());
		open.label = Some("smb".into());
		let out = normalize(&[agent("a", 1), agent("b", 2)], &[open]);
		assert_eq!(out.links.len(), 1);
		assert_eq!(out.links[0].label.as_deref(), Some("smb"));
	}
}
