//! Per-view memory of which node ids have already been shown.

use std::collections::HashSet;

/// Every node id observed during one view's lifetime.
///
/// Owned by the view session and dropped with it, so navigating away and back
/// starts from an empty set.
#[derive(Debug, Default)]
pub struct IdentityTracker {
	seen: HashSet<String>,
}

impl IdentityTracker {
	/// Empty tracker for a freshly mounted view.
	pub fn new() -> Self {
		Self::default()
	}

	/// True the first time `id` is offered; records it as seen.
	pub fn is_new(&mut self, id: &str) -> bool {
		if self.seen.contains(id) {
			return false;
		}
		self.seen.insert(id.to_string())
	}

	/// Number of distinct ids seen so far.
	pub fn len(&self) -> usize {
		self.seen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seen.is_empty()
	}
}
