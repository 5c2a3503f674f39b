use leptos::prelude::*;
use leptos_router::components::A;
use leptos_router::hooks::use_params_map;

/// Landing page for a node activated on the topology canvas.
#[component]
pub fn AgentDetail() -> impl IntoView {
	let params = use_params_map();
	let display_id = move || params.read().get("display_id").unwrap_or_default();

	view! {
		<div class="agent-detail">
			<h1>"Agent " {display_id}</h1>
			<A href="/">"Back to topology"</A>
		</div>
	}
}
