use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::{GraphStore, NODE_RADIUS, ROOT_RADIUS};
use super::types::{EdgeKind, Node, Position, ROOT_ID};

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

fn node_color(node: &Node) -> &'static str {
	if node.metadata.is_high_integrity() {
		"#d62728"
	} else {
		"#1f77b4"
	}
}

/// Position as drawn: entering nodes slide down from root while fading in.
fn drawn_position(state: &GraphStore, id: &str) -> Option<(Position, f64)> {
	let root = state.root()?;
	if id == ROOT_ID {
		return Some((root, 1.0));
	}
	let node = state.nodes().iter().find(|n| n.id == id)?;
	let p = node.position?;
	let t = ease_out_cubic(state.entrance_progress(id));
	Some((
		Position::new(root.x + (p.x - root.x) * t, root.y + (p.y - root.y) * t),
		t,
	))
}

pub fn render(state: &GraphStore, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	if state.root().is_none() {
		return;
	}
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_root(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_edges(state: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let Some(snapshot) = state.snapshot() else {
		return;
	};
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	let dash_offset = -(state.anim_time * 30.0) % (dash + gap);
	let t = ease_out_cubic(state.hover.highlight_t);

	for edge in &snapshot.edges {
		let (Some((from, fa)), Some((to, ta))) =
			(drawn_position(state, &edge.source), drawn_position(state, &edge.target))
		else {
			continue;
		};
		let (dx, dy) = (to.x - from.x, to.y - from.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}
		let from_r = if edge.source == ROOT_ID { ROOT_RADIUS } else { NODE_RADIUS };
		let to_r = if edge.target == ROOT_ID { ROOT_RADIUS } else { NODE_RADIUS };

		let is_highlighted = state.is_highlighted(&edge.source) && state.is_highlighted(&edge.target);
		let base = if edge.kind == EdgeKind::SyntheticRoot { 0.35 } else { 0.6 };
		let (edge_alpha, width) = if is_highlighted {
			(base + 0.3 * t, line_width * (1.0 + 0.3 * t))
		} else {
			(base - (base - 0.15) * t, line_width * (1.0 - 0.3 * t))
		};
		let edge_alpha = edge_alpha * fa.min(ta);
		let rgb = if edge.active { "120, 255, 170" } else { "100, 180, 255" };

		ctx.set_stroke_style_str(&format!("rgba({rgb}, {edge_alpha})"));
		ctx.set_line_width(if edge.active { width * 1.6 } else { width });
		// Only fresh links flow; stale and synthetic ones are solid or static dashes.
		if edge.active {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(&JsValue::from_f64(dash), &JsValue::from_f64(gap)));
			ctx.set_line_dash_offset(dash_offset);
		} else if edge.kind == EdgeKind::SyntheticRoot {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(&JsValue::from_f64(gap), &JsValue::from_f64(gap)));
			ctx.set_line_dash_offset(0.0);
		}

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.begin_path();
		ctx.move_to(from.x + ux * from_r, from.y + uy * from_r);
		ctx.line_to(to.x - ux * (to_r + arrow_size), to.y - uy * (to_r + arrow_size));
		ctx.stroke();

		let _ = ctx.set_line_dash(&js_sys::Array::new());
		ctx.set_fill_style_str(&format!("rgba({rgb}, {})", (edge_alpha + 0.2).min(1.0)));
		let (tip_x, tip_y) = (to.x - ux * to_r, to.y - uy * to_r);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		if let Some(label) = &edge.label {
			ctx.set_fill_style_str(&format!("rgba(200, 220, 255, {})", edge_alpha));
			ctx.set_font(&format!("{}px sans-serif", 9.0 / k.max(0.5)));
			let _ = ctx.fill_text(label, from.x + dx / 2.0 + 4.0, from.y + dy / 2.0);
		}
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_root(state: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let Some(root) = state.root() else {
		return;
	};
	let k = state.transform.k;
	ctx.begin_path();
	let _ = ctx.arc(root.x, root.y, ROOT_RADIUS, 0.0, 2.0 * PI);
	ctx.set_fill_style_str("#e0e0e0");
	ctx.fill();
	ctx.set_fill_style_str("white");
	ctx.set_font(&format!("bold {}px sans-serif", 11.0 / k.max(0.5)));
	let _ = ctx.fill_text("C2", root.x + ROOT_RADIUS + 4.0, root.y + 4.0);
}

fn draw_nodes(state: &GraphStore, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform.k,
	);

	for node in state.nodes() {
		let Some((p, appear)) = drawn_position(state, &node.id) else {
			continue;
		};
		let hovered = has_highlight && state.is_hovered(&node.id);
		let dimmed = has_highlight && !state.is_highlighted(&node.id);
		let alpha = appear * (if dimmed { 1.0 - 0.7 * t } else { 1.0 });
		let grow = if hovered { 1.0 + 0.35 * t } else { 1.0 };
		let radius = NODE_RADIUS * grow * (0.4 + 0.6 * appear);

		ctx.set_global_alpha(alpha);
		ctx.begin_path();
		let _ = ctx.arc(p.x, p.y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(node_color(node));
		ctx.fill();

		if node.metadata.is_high_integrity() {
			ctx.begin_path();
			let _ = ctx.arc(p.x, p.y, radius + 3.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("rgba(255, 200, 80, 0.9)");
			ctx.set_line_width(1.5 / k);
			ctx.stroke();
		}

		let font = 10.0 / k.max(0.5);
		ctx.set_fill_style_str("rgba(255, 255, 255, 0.85)");
		ctx.set_font(&format!("{font}px sans-serif"));
		let title = format!("{} {}@{}", node.display_id, node.metadata.user, node.metadata.host);
		let _ = ctx.fill_text(&title, p.x + radius + 4.0, p.y + 3.0);
		ctx.set_fill_style_str("rgba(180, 190, 210, 0.8)");
		let _ = ctx.fill_text(&node.freshness.bucket.to_string(), p.x + radius + 4.0, p.y + 3.0 + font * 1.2);

		if hovered && t > 0.01 {
			let meta = &node.metadata;
			let detail = format!(
				"{} | pid {} | {} {} | integrity {}",
				meta.ip,
				meta.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
				meta.os,
				meta.architecture,
				meta.integrity_level,
			);
			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", 0.9 * t));
			let _ = ctx.fill_text(&detail, p.x + radius + 4.0, p.y + 3.0 + font * 2.4);
		}
		ctx.set_global_alpha(1.0);
	}
}
