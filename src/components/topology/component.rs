use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::Utc;
use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_navigate;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::session::{BackgroundTasks, TopologySession};
use super::source::RecordSource;
use crate::config::TopologyConfig;

type Shared = Rc<RefCell<Option<TopologySession>>>;
type SharedClosure = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Everything a mounted canvas keeps running. Dropped with the component's
/// owner: stops the loops, tears the session down and releases the closures.
struct ViewTeardown {
	session: Shared,
	tasks: Rc<RefCell<BackgroundTasks>>,
	animate: SharedClosure,
	frame: Rc<Cell<Option<i32>>>,
	resize_cb: SharedClosure,
}

impl Drop for ViewTeardown {
	fn drop(&mut self) {
		self.tasks.borrow_mut().abort_all();
		if let Some(mut s) = self.session.borrow_mut().take() {
			s.teardown();
		}
		let window = web_sys::window();
		if let (Some(win), Some(id)) = (window.as_ref(), self.frame.take()) {
			let _ = win.cancel_animation_frame(id);
		}
		if let (Some(win), Some(cb)) = (window.as_ref(), self.resize_cb.borrow_mut().take()) {
			let _ = win.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		// The frame closure holds its own cell; taking it breaks the cycle.
		self.animate.borrow_mut().take();
	}
}

fn window_size(window: &Window) -> (f64, f64) {
	(
		window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0),
		window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0),
	)
}

fn local_xy(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Poll loop: one request at a time, each result merged before the next.
async fn poll_loop(session: Shared, source: RecordSource, interval_ms: u32) {
	loop {
		let ticket = session.borrow_mut().as_mut().and_then(|s| s.begin_poll());
		let Some(ticket) = ticket else {
			break;
		};
		let result = source.fetch().await;
		match session.borrow_mut().as_mut() {
			Some(s) => {
				s.on_poll_result(ticket, result, Utc::now());
			}
			None => break,
		}
		TimeoutFuture::new(interval_ms).await;
	}
}

/// Freshness clock: never touches graph membership.
async fn clock_loop(session: Shared, interval_ms: u32) {
	loop {
		TimeoutFuture::new(interval_ms).await;
		match session.borrow_mut().as_mut() {
			Some(s) => s.on_clock_tick(Utc::now()),
			None => break,
		}
	}
}

/// Live agent topology on a canvas. Polls the record source, merges each
/// result into the rendered graph and navigates to `/agents/{display_id}`
/// when a node is clicked.
#[component]
pub fn TopologyCanvas(
	config: TopologyConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let session: Shared = Rc::new(RefCell::new(None));
	let tasks = Rc::new(RefCell::new(BackgroundTasks::default()));
	let animate: SharedClosure = Rc::new(RefCell::new(None));
	let frame = Rc::new(Cell::new(None));
	let resize_cb: SharedClosure = Rc::new(RefCell::new(None));
	let (session_init, tasks_init, animate_init, frame_init, resize_cb_init) = (
		session.clone(),
		tasks.clone(),
		animate.clone(),
		frame.clone(),
		resize_cb.clone(),
	);

	let _teardown = StoredValue::new_local(ViewTeardown {
		session: session.clone(),
		tasks,
		animate,
		frame,
		resize_cb,
	});

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if session_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = match canvas.get_context("2d") {
			Ok(Some(ctx)) => match ctx.dyn_into() {
				Ok(ctx) => ctx,
				Err(_) => return,
			},
			_ => {
				log::warn!("2d canvas context unavailable");
				return;
			}
		};
		*session_init.borrow_mut() = Some(TopologySession::new(config.clone(), w, h));

		if fullscreen {
			let (session_resize, canvas_resize) = (session_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *session_resize.borrow_mut() {
					s.store_mut().resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (session_anim, animate_inner, frame_anim) =
			(session_init.clone(), animate_init.clone(), frame_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			frame_anim.set(None);
			let Some(win) = web_sys::window() else {
				return;
			};
			match session_anim.borrow_mut().as_mut() {
				Some(s) => {
					s.store_mut().tick(0.016);
					render::render(s.store(), &ctx);
				}
				None => return,
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				frame_anim.set(win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			frame_init.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		}

		let source = RecordSource::new(&config.api_base);
		let (poll, clock) = {
			let mut tasks = tasks_init.borrow_mut();
			(
				tasks.track(poll_loop(session_init.clone(), source, config.poll_interval_ms)),
				tasks.track(clock_loop(session_init.clone(), config.clock_interval_ms)),
			)
		};
		spawn_local(async move {
			let _ = poll.await;
		});
		spawn_local(async move {
			let _ = clock.await;
		});
	});

	let session_md = session.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = local_xy(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *session_md.borrow_mut() {
			s.store_mut().pointer_down(x, y);
		}
	};

	let session_mm = session.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = local_xy(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *session_mm.borrow_mut() {
			s.store_mut().pointer_move(x, y);
		}
	};

	let session_mu = session.clone();
	let navigate = use_navigate();
	let on_mouseup = move |_: MouseEvent| {
		let activated = session_mu
			.borrow_mut()
			.as_mut()
			.and_then(|s| s.store_mut().pointer_up());
		if let Some(display_id) = activated {
			navigate(&format!("/agents/{display_id}"), Default::default());
		}
	};

	let session_ml = session.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *session_ml.borrow_mut() {
			s.store_mut().pointer_leave();
		}
	};

	let session_wh = session.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_xy(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *session_wh.borrow_mut() {
			s.store_mut().zoom_at(x, y, ev.delta_y());
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="topology-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
