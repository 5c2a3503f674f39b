//! Graph store: the rendered snapshot plus pan, zoom, drag and hover state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use super::recency;
use super::types::{GraphSnapshot, Node, Position};

/// Drawn radius of an agent node, in graph units.
pub const NODE_RADIUS: f64 = 10.0;
/// Drawn radius of the root node.
pub const ROOT_RADIUS: f64 = 14.0;
/// Pointer hit radius around a node centre, in graph units.
pub const HIT_RADIUS: f64 = 16.0;
/// Seconds an entrance takes once its stagger delay has elapsed.
pub const ENTRANCE_SECS: f64 = 0.45;
/// Screen-space movement below which a press-release is a click.
const CLICK_SLOP: f64 = 4.0;

/// Screen = graph * `k` + `(x, y)`.
#[derive(Clone, Debug)]
pub struct ViewTransform {
	/// Horizontal translation in screen pixels.
	pub x: f64,
	/// Vertical translation in screen pixels.
	pub y: f64,
	/// Zoom factor.
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

/// A press that landed on a node.
#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	/// Id of the pressed node.
	pub node: Option<String>,
	/// Pointer travelled past the click slop; the release is not a click.
	pub moved: bool,
	/// Screen position of the press.
	pub start_x: f64,
	pub start_y: f64,
	/// Node position at the press.
	pub node_start: Position,
}

/// A press on empty canvas.
#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	/// Screen position of the press.
	pub start_x: f64,
	pub start_y: f64,
	/// Translation at the press.
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// Hovered node and its eased highlight.
#[derive(Clone, Debug, Default)]
pub struct HoverState {
	/// Node under the pointer.
	pub node: Option<String>,
	/// Ids sharing an edge with `node`.
	pub neighbors: HashSet<String>,
	/// Highlight strength in `0.0..=1.0`.
	pub highlight_t: f64,
	/// Previously hovered node, kept while its highlight fades out.
	pub prev_node: Option<String>,
	pub prev_neighbors: HashSet<String>,
	delay_t: f64,
}

/// Current rendered graph plus everything the canvas needs to draw it.
///
/// Node and edge membership only changes through [`GraphStore::commit`],
/// called by the merge engine once per applied poll.
pub struct GraphStore {
	root: Option<Position>,
	snapshot: Option<GraphSnapshot>,
	/// Graph-time at which each staggered entrance begins.
	entrances: HashMap<String, f64>,
	stagger_secs: f64,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	/// Canvas size in CSS pixels.
	pub width: f64,
	pub height: f64,
	/// Seconds of presentation time since mount.
	pub anim_time: f64,
}

impl GraphStore {
	/// Empty store for a `width` x `height` canvas, root centred horizontally
	/// a quarter of the way down.
	pub fn new(root: Option<Position>, width: f64, height: f64) -> Self {
		let anchor = root.unwrap_or_default();
		Self {
			root,
			snapshot: None,
			entrances: HashMap::new(),
			stagger_secs: 0.0,
			transform: ViewTransform {
				x: width / 2.0 - anchor.x,
				y: height / 4.0 - anchor.y,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			anim_time: 0.0,
		}
	}

	/// Delay between consecutive entrances of one batch.
	pub fn with_stagger(mut self, stagger_ms: u32) -> Self {
		self.stagger_secs = f64::from(stagger_ms) / 1000.0;
		self
	}

	/// Anchor of the synthetic root, if the view has one.
	pub fn root(&self) -> Option<Position> {
		self.root
	}

	/// `None` until the first cycle has been applied.
	pub fn snapshot(&self) -> Option<&GraphSnapshot> {
		self.snapshot.as_ref()
	}

	/// Nodes of the current snapshot; empty before the first cycle.
	pub fn nodes(&self) -> &[Node] {
		self.snapshot.as_ref().map(|s| s.nodes.as_slice()).unwrap_or_default()
	}

	/// Replace the rendered graph with the next cycle's.
	pub(super) fn commit(&mut self, next: GraphSnapshot) {
		let present: HashSet<&str> = next.nodes.iter().map(|n| n.id.as_str()).collect();
		self.entrances.retain(|id, _| present.contains(id.as_str()));
		for node in &next.nodes {
			if let Some(order) = node.entrance_order {
				self.entrances
					.insert(node.id.clone(), self.anim_time + f64::from(order) * self.stagger_secs);
			}
		}
		if self.hover.node.as_deref().is_some_and(|id| !present.contains(id)) {
			self.hover = HoverState::default();
		}
		if self.drag.node.as_deref().is_some_and(|id| !present.contains(id)) {
			self.drag = DragState::default();
		}
		self.snapshot = Some(next);
	}

	/// Clock path: recompute freshness text and edge activity only.
	pub fn refresh_freshness(&mut self, now: DateTime<Utc>, window: Duration) {
		let Some(snapshot) = self.snapshot.as_mut() else {
			return;
		};
		for node in &mut snapshot.nodes {
			node.freshness = recency::evaluate(node.metadata.last_checkin.as_deref(), now);
		}
		for edge in &mut snapshot.edges {
			edge.active = recency::is_active(edge.driven_by.as_deref(), now, window);
		}
	}

	/// Entrance progress in `0.0..=1.0`; nodes without an entrance are fully in.
	pub fn entrance_progress(&self, id: &str) -> f64 {
		match self.entrances.get(id) {
			Some(start) => ((self.anim_time - start) / ENTRANCE_SECS).clamp(0.0, 1.0),
			None => 1.0,
		}
	}

	/// Screen pixels to graph coordinates.
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost placed node under a screen point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<&Node> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		self.nodes().iter().rev().find(|node| {
			node.position.is_some_and(|p| {
				let (dx, dy) = (p.x - gx, p.y - gy);
				// HIT_RADIUS is in world-space, scales with zoom like nodes
				(dx * dx + dy * dy).sqrt() < HIT_RADIUS
			})
		})
	}

	/// Starts a node drag on a hit, otherwise a pan.
	pub fn pointer_down(&mut self, x: f64, y: f64) {
		let hit = self.node_at_position(x, y).map(|n| (n.id.clone(), n.position.unwrap_or_default()));
		if let Some((id, start)) = hit {
			self.drag = DragState {
				active: true,
				node: Some(id),
				moved: false,
				start_x: x,
				start_y: y,
				node_start: start,
			};
		} else {
			self.pan = PanState {
				active: true,
				start_x: x,
				start_y: y,
				transform_start_x: self.transform.x,
				transform_start_y: self.transform.y,
			};
		}
	}

	pub fn pointer_move(&mut self, x: f64, y: f64) {
		// Update hover state when not dragging
		if !self.drag.active {
			let hovered = self.node_at_position(x, y).map(|n| n.id.clone());
			self.set_hover(hovered);
		}

		if self.drag.active {
			let (dx, dy) = (x - self.drag.start_x, y - self.drag.start_y);
			if (dx * dx + dy * dy).sqrt() >= CLICK_SLOP {
				self.drag.moved = true;
			}
			if !self.drag.moved {
				return;
			}
			let to = Position::new(
				self.drag.node_start.x + dx / self.transform.k,
				self.drag.node_start.y + dy / self.transform.k,
			);
			if let (Some(id), Some(snapshot)) = (self.drag.node.as_deref(), self.snapshot.as_mut()) {
				if let Some(node) = snapshot.node_mut(id) {
					node.position = Some(to);
				}
			}
		} else if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (x - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (y - self.pan.start_y);
		}
	}

	/// Ends a drag or pan. A press-release on a node without movement
	/// activates it; its display id is returned for navigation.
	pub fn pointer_up(&mut self) -> Option<u32> {
		let activated = match (&self.drag, self.snapshot.as_ref()) {
			(DragState { active: true, moved: false, node: Some(id), .. }, Some(snapshot)) => {
				snapshot.node(id).map(|n| n.display_id)
			}
			_ => None,
		};
		self.drag = DragState::default();
		self.pan.active = false;
		activated
	}

	pub fn pointer_leave(&mut self) {
		self.drag = DragState::default();
		self.pan.active = false;
		self.set_hover(None);
	}

	/// Zoom by one wheel step, keeping the screen point fixed.
	pub fn zoom_at(&mut self, x: f64, y: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = x - (x - self.transform.x) * ratio;
		self.transform.y = y - (y - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn set_hover(&mut self, node: Option<String>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Save previous state for fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.neighbors.clear();
		if let (Some(id), Some(snapshot)) = (node.as_deref(), self.snapshot.as_ref()) {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for edge in snapshot.edges.iter().filter(|e| e.touches(id)) {
				let other = if edge.source == id { &edge.target } else { &edge.source };
				self.hover.neighbors.insert(other.clone());
			}
		}
		self.hover.node = node;
	}

	pub fn is_highlighted(&self, id: &str) -> bool {
		self.is_hovered(id) || self.hover.neighbors.contains(id) || self.hover.prev_neighbors.contains(id)
	}

	pub fn is_hovered(&self, id: &str) -> bool {
		self.hover.node.as_deref() == Some(id) || self.hover.prev_node.as_deref() == Some(id)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	/// Advance presentation time: entrances, edge pulse and hover easing.
	pub fn tick(&mut self, dt: f64) {
		self.anim_time += dt;

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::topology::types::{Edge, EdgeKind, NodeMetadata, ROOT_ID};

	fn store_with(nodes: Vec<(&str, u32, Position)>) -> GraphStore {
		let mut store = GraphStore::new(Some(Position::default()), 400.0, 400.0);
		store.transform = ViewTransform::default();
		let snapshot = GraphSnapshot {
			nodes: nodes
				.into_iter()
				.map(|(id, display, p)| {
					let mut n = Node::new(id.into(), display, NodeMetadata::default());
					n.position = Some(p);
					n
				})
				.collect(),
			edges: vec![Edge::new(ROOT_ID, "a", EdgeKind::SyntheticRoot)],
		};
		store.commit(snapshot);
		store
	}

	#[test]
	fn click_without_movement_activates() {
		let mut store = store_with(vec![("a", 7, Position::new(50.0, 50.0))]);
		store.pointer_down(52.0, 49.0);
		store.pointer_move(53.0, 49.0);
		assert_eq!(store.pointer_up(), Some(7));
		assert_eq!(store.nodes()[0].position, Some(Position::new(50.0, 50.0)));
	}

	#[test]
	fn drag_moves_node_and_does_not_activate() {
		let mut store = store_with(vec![("a", 7, Position::new(50.0, 50.0))]);
		store.pointer_down(50.0, 50.0);
		store.pointer_move(80.0, 60.0);
		assert_eq!(store.pointer_up(), None);
		assert_eq!(store.nodes()[0].position, Some(Position::new(80.0, 60.0)));
	}

	#[test]
	fn background_press_pans() {
		let mut store = store_with(vec![("a", 7, Position::new(50.0, 50.0))]);
		store.pointer_down(200.0, 200.0);
		store.pointer_move(210.0, 190.0);
		assert_eq!(store.pointer_up(), None);
		assert_eq!((store.transform.x, store.transform.y), (10.0, -10.0));
	}

	#[test]
	fn hover_collects_neighbors() {
		let mut store = store_with(vec![("a", 1, Position::new(0.0, 100.0))]);
		store.set_hover(Some("a".into()));
		assert!(store.is_hovered("a"));
		assert!(store.is_highlighted(ROOT_ID));
		store.set_hover(None);
		assert!(store.has_active_highlight());
	}

	#[test]
	fn entrance_stagger_schedule() {
		let mut store = GraphStore::new(Some(Position::default()), 100.0, 100.0).with_stagger(100);
		let mut first = Node::new("a".into(), 1, NodeMetadata::default());
		first.entrance_order = Some(0);
		let mut second = Node::new("b".into(), 2, NodeMetadata::default());
		second.entrance_order = Some(2);
		store.commit(GraphSnapshot {
			nodes: vec![first, second],
			edges: Vec::new(),
		});
		store.tick(0.1);
		assert!(store.entrance_progress("a") > 0.0);
		assert_eq!(store.entrance_progress("b"), 0.0);
		assert_eq!(store.entrance_progress("unknown"), 1.0);
	}

	#[test]
	fn zoom_is_clamped() {
		let mut store = GraphStore::new(None, 100.0, 100.0);
		for _ in 0..100 {
			store.zoom_at(10.0, 10.0, 1.0);
		}
		assert!((store.transform.k - 0.1).abs() < 1e-9);
	}
}
