//! Wire records from the data source and the graph model built from them.

use serde::Deserialize;

use super::recency::Recency;

/// Reserved identifier of the synthetic root node. Never produced by data.
pub const ROOT_ID: &str = "__root__";

/// Identifier that may arrive as a JSON string or number.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
	/// Numeric id.
	Number(i64),
	/// String id, possibly blank.
	Text(String),
}

impl RawId {
	/// Canonical string form; `None` for blank strings.
	pub fn canonical(&self) -> Option<String> {
		match self {
			RawId::Number(n) => Some(n.to_string()),
			RawId::Text(s) => {
				let s = s.trim();
				(!s.is_empty()).then(|| s.to_string())
			}
		}
	}
}

/// IP field: usually a JSON-encoded list inside a string, sometimes a bare
/// string, occasionally an already-decoded list.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawIp {
	/// Already-decoded list of addresses.
	List(Vec<String>),
	/// JSON list encoded in a string, or a bare address.
	Text(String),
}

/// One active-agent record as delivered by the data source.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentRecord {
	/// Stable unique id; becomes the node id.
	pub id: Option<RawId>,
	/// Short operator-facing number, also the detail route parameter.
	pub display_id: Option<RawId>,
	pub user: Option<String>,
	pub host: Option<String>,
	pub ip: Option<RawIp>,
	pub pid: Option<u32>,
	pub domain: Option<String>,
	pub os: Option<String>,
	pub architecture: Option<String>,
	/// Process integrity; above 2 means elevated.
	pub integrity_level: Option<i32>,
	pub agent_type: Option<String>,
	pub description: Option<String>,
	/// Timestamp of the last check-in, any supported format.
	pub last_checkin: Option<String>,
	/// `Some(false)` marks a record to skip.
	pub active: Option<bool>,
}

/// One link record asserting a directed relationship between two agents,
/// or between an agent and root.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkRecord {
	/// Parent agent id, or the root id.
	pub source_id: Option<RawId>,
	/// Child agent id.
	pub destination_id: Option<RawId>,
	/// Set once the link is closed; closed links are ignored.
	pub end_timestamp: Option<String>,
	/// Free-form transport label drawn on the edge.
	pub label: Option<String>,
	/// Last traffic over the link; drives the active animation.
	pub timestamp: Option<String>,
}

/// Both record streams from one poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordBatch {
	/// Agent records in delivery order.
	pub agents: Vec<AgentRecord>,
	/// Link records in delivery order.
	pub links: Vec<LinkRecord>,
}

/// Graph-space coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate, growing downwards.
	pub y: f64,
}

impl Position {
	/// Position at `(x, y)`.
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

/// Descriptive fields of an agent, refreshed every cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeMetadata {
	/// Account the agent runs as.
	pub user: String,
	pub host: String,
	/// First address reported by the agent, or empty.
	pub ip: String,
	pub pid: Option<u32>,
	pub domain: String,
	pub os: String,
	pub architecture: String,
	/// Zero when the record carried none.
	pub integrity_level: i32,
	pub agent_type: String,
	pub description: String,
	/// Raw check-in timestamp; `None` when blank.
	pub last_checkin: Option<String>,
}

impl NodeMetadata {
	/// Integrity levels above 2 denote an elevated agent.
	pub fn is_high_integrity(&self) -> bool {
		self.integrity_level > 2
	}
}

/// One rendered agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Canonical id, never [`ROOT_ID`].
	pub id: String,
	/// Operator-facing number.
	pub display_id: u32,
	/// Descriptive fields from the latest record.
	pub metadata: NodeMetadata,
	/// `None` until the layout engine (or a drag) places the node.
	pub position: Option<Position>,
	/// True only in the cycle the id is first observed.
	pub first_seen: bool,
	/// Rank within this cycle's batch of first-seen nodes.
	pub entrance_order: Option<u32>,
	/// Check-in recency, recomputed on every poll and clock tick.
	pub freshness: Recency,
}

impl Node {
	/// Unplaced node with no recency yet.
	pub fn new(id: String, display_id: u32, metadata: NodeMetadata) -> Self {
		Self {
			id,
			display_id,
			metadata,
			position: None,
			first_seen: false,
			entrance_order: None,
			freshness: Recency::never(),
		}
	}
}

/// Where an edge came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
	/// Backed by an open link record.
	Explicit,
	/// Inserted so an otherwise unreachable node connects to root.
	SyntheticRoot,
}

/// Directed edge between two nodes, or between root and a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
	/// See [`edge_id`].
	pub id: String,
	/// Parent node id or [`ROOT_ID`].
	pub source: String,
	/// Child node id.
	pub target: String,
	pub kind: EdgeKind,
	/// Transport label of an explicit link.
	pub label: Option<String>,
	/// Timestamp whose recency decides `active`.
	pub driven_by: Option<String>,
	/// `driven_by` falls inside the activity window.
	pub active: bool,
}

impl Edge {
	/// Inactive, unlabelled edge from `source` to `target`.
	pub fn new(source: &str, target: &str, kind: EdgeKind) -> Self {
		Self {
			id: edge_id(source, target),
			source: source.to_string(),
			target: target.to_string(),
			kind,
			label: None,
			driven_by: None,
			active: false,
		}
	}

	/// Whether `id` is either endpoint.
	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}
}

/// Deterministic edge id for a `(source, target)` pair.
///
/// The source length prefix keeps ids unique even when node ids contain `->`.
pub fn edge_id(source: &str, target: &str) -> String {
	format!("{}:{source}->{target}", source.len())
}

/// One rendered cycle: every node and edge currently on screen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
	/// Agents, excluding root.
	pub nodes: Vec<Node>,
	/// Explicit edges first, then synthetic root edges.
	pub edges: Vec<Edge>,
}

impl GraphSnapshot {
	/// Node by id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.nodes.iter().find(|n| n.id == id)
	}

	pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
		self.nodes.iter_mut().find(|n| n.id == id)
	}

	/// Edge by its endpoints.
	pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
		let id = edge_id(source, target);
		self.edges.iter().find(|e| e.id == id)
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}
