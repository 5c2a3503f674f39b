//! Runtime configuration for the topology view.

use serde::Deserialize;

use crate::error::{TopologyError, TopologyResult};

/// Name of the `<meta>` element that may carry a JSON config blob.
pub const CONFIG_META_NAME: &str = "topology-config";

/// Fixed geometry of the two-tier layout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
	/// Root anchor x, in graph space.
	pub root_x: f64,
	/// Root anchor y, in graph space.
	pub root_y: f64,
	/// Vertical distance between root and tier 1, and between the tiers.
	pub tier_gap: f64,
	/// Horizontal distance between neighbouring nodes on a band.
	pub spacing: f64,
}

impl Default for LayoutParams {
	fn default() -> Self {
		Self {
			root_x: 0.0,
			root_y: 0.0,
			tier_gap: 140.0,
			spacing: 120.0,
		}
	}
}

/// Polling, freshness and layout settings for one topology view.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
	/// Base URL of the record endpoints (`{api_base}/agents`, `{api_base}/links`).
	pub api_base: String,
	/// Interval between polls of the data source.
	pub poll_interval_ms: u32,
	/// Interval of the freshness-only clock tick.
	pub clock_interval_ms: u32,
	/// An edge is active while its driving timestamp is at most this old.
	pub activity_window_secs: i64,
	/// Presentation delay per entrance-order step.
	pub stagger_ms: u32,
	/// Two-tier layout geometry.
	pub layout: LayoutParams,
}

impl Default for TopologyConfig {
	fn default() -> Self {
		Self {
			api_base: "/api".into(),
			poll_interval_ms: 3000,
			clock_interval_ms: 1000,
			activity_window_secs: 5,
			stagger_ms: 120,
			layout: LayoutParams::default(),
		}
	}
}

impl TopologyConfig {
	/// Parse a config blob; absent keys take their defaults.
	pub fn from_json(raw: &str) -> TopologyResult<Self> {
		let config: Self =
			serde_json::from_str(raw).map_err(|e| TopologyError::Config(e.to_string()))?;
		if config.poll_interval_ms == 0 || config.clock_interval_ms == 0 {
			return Err(TopologyError::Config("intervals must be non-zero".into()));
		}
		if config.layout.spacing <= 0.0 {
			return Err(TopologyError::Config("layout spacing must be positive".into()));
		}
		if config.layout.tier_gap <= 0.0 {
			return Err(TopologyError::Config("layout tier_gap must be positive".into()));
		}
		Ok(config)
	}

	/// Read the config from the page's `<meta name="topology-config">`, falling
	/// back to defaults when it is absent or invalid.
	pub fn from_document() -> Self {
		let content = web_sys::window()
			.and_then(|w| w.document())
			.and_then(|d| {
				d.query_selector(&format!("meta[name=\"{CONFIG_META_NAME}\"]"))
					.ok()
					.flatten()
			})
			.and_then(|el| el.get_attribute("content"));

		match content {
			Some(raw) => Self::from_json(&raw).unwrap_or_else(|e| {
				log::warn!("{e}; using default topology config");
				Self::default()
			}),
			None => Self::default(),
		}
	}
}
