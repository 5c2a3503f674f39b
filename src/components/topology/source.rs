//! HTTP data source for agent and link records.

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{AgentRecord, LinkRecord, RecordBatch};
use crate::error::{TopologyError, TopologyResult};

/// Read-only client for `{base}/agents` and `{base}/links`.
#[derive(Clone, Debug)]
pub struct RecordSource {
	client: reqwest::Client,
	base: String,
}

impl RecordSource {
	pub fn new(base: &str) -> Self {
		Self {
			client: reqwest::Client::new(),
			base: base.trim_end_matches('/').to_string(),
		}
	}

	fn url(&self, path: &str) -> String {
		let base = if self.base.starts_with("http") {
			self.base.clone()
		} else {
			// reqwest needs an absolute URL in the browser too.
			let origin = web_sys::window()
				.and_then(|w| w.location().origin().ok())
				.unwrap_or_default();
			format!("{origin}{}", self.base)
		};
		format!("{base}/{path}")
	}

	async fn fetch_array(&self, path: &str) -> TopologyResult<Vec<Value>> {
		let response = self
			.client
			.get(self.url(path))
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| TopologyError::Transport(e.to_string()))?;
		response
			.json::<Vec<Value>>()
			.await
			.map_err(|e| TopologyError::Decode(e.to_string()))
	}

	/// Fetch both record streams for one poll.
	pub async fn fetch(&self) -> TopologyResult<RecordBatch> {
		let agents = self.fetch_array("agents").await?;
		let links = self.fetch_array("links").await?;
		Ok(RecordBatch {
			agents: decode_records::<AgentRecord>(agents),
			links: decode_records::<LinkRecord>(links),
		})
	}
}

/// Decode each element on its own so one bad record cannot sink the batch.
pub fn decode_records<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
	values
		.into_iter()
		.filter_map(|v| match serde_json::from_value(v) {
			Ok(record) => Some(record),
			Err(e) => {
				warn!("dropping undecodable record: {e}");
				None
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn bad_element_does_not_sink_batch() {
		let values = vec![
			json!({"id": "a", "display_id": 1, "ip": "[\"10.0.0.1\"]"}),
			json!({"id": "b", "display_id": 2, "pid": "not-a-number"}),
			json!({"id": 3, "display_id": 3, "ip": ["10.0.0.3"]}),
		];
		let agents: Vec<AgentRecord> = decode_records(values);
		assert_eq!(agents.len(), 2);
	}

	#[test]
	fn link_records_decode() {
		let values = vec![json!({
			"source_id": 1,
			"destination_id": "2",
			"end_timestamp": null,
			"label": "tcp"
		})];
		let links: Vec<LinkRecord> = decode_records(values);
		assert_eq!(links.len(), 1);
		assert_eq!(links[0].end_timestamp, None);
		assert_eq!(links[0].label.as_deref(), Some("tcp"));
	}
}
