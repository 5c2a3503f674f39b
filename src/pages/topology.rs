use leptos::prelude::*;

use crate::components::topology::TopologyCanvas;
use crate::config::TopologyConfig;

/// Full-screen live topology of active agents.
#[component]
pub fn Topology() -> impl IntoView {
	let config = use_context::<TopologyConfig>().unwrap_or_default();

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<TopologyCanvas config=config.clone() fullscreen=true />
				<div class="graph-overlay">
					<h1>"Active Agents"</h1>
					<p class="subtitle">"Click an agent to open it. Drag to reposition. Scroll to zoom."</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
