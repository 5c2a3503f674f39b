//! Everything that lives exactly as long as one mounted topology view.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::{AbortHandle, Abortable};
use log::{debug, info, warn};

use super::merge::{CycleSummary, MergeEngine};
use super::normalize::normalize;
use super::state::GraphStore;
use super::types::{Position, RecordBatch};
use crate::config::TopologyConfig;
use crate::error::TopologyResult;

/// Identifies one poll request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket(u64);

/// Depth-one single flight: only the most recently issued poll may land.
/// A newer request supersedes any still in flight.
#[derive(Debug, Default)]
pub struct SingleFlight {
	issued: u64,
	cancelled: bool,
}

impl SingleFlight {
	pub fn begin(&mut self) -> PollTicket {
		self.issued += 1;
		PollTicket(self.issued)
	}

	/// Accepts `ticket` if it is the latest issued and not yet settled.
	pub fn settle(&mut self, ticket: PollTicket) -> bool {
		if self.cancelled || ticket.0 != self.issued {
			return false;
		}
		// Consumed: a duplicate delivery of the same ticket is ignored.
		self.issued += 1;
		true
	}

	pub fn cancel(&mut self) {
		self.cancelled = true;
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled
	}
}

/// Abort handles for the loops a mounted view spawns. Aborting drops the
/// wrapped future at its next poll, along with any timer or request it holds.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
	handles: Vec<AbortHandle>,
}

impl BackgroundTasks {
	/// Wrap `task` so that [`BackgroundTasks::abort_all`] can stop it.
	pub fn track<F: Future>(&mut self, task: F) -> Abortable<F> {
		let (handle, registration) = AbortHandle::new_pair();
		self.handles.push(handle);
		Abortable::new(task, registration)
	}

	/// Abort every tracked task. Idempotent.
	pub fn abort_all(&mut self) {
		for handle in self.handles.drain(..) {
			handle.abort();
		}
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}
}

/// How a poll result was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
	Applied(CycleSummary),
	/// Superseded by a newer poll, or arrived after teardown.
	Stale,
	/// Poll or layout failed; the previous graph stays on screen.
	Retained,
}

/// View-scoped owner of the graph store, merge engine and poll sequencing.
pub struct TopologySession {
	config: TopologyConfig,
	engine: MergeEngine,
	store: GraphStore,
	flight: SingleFlight,
	cycles: u64,
}

impl TopologySession {
	pub fn new(config: TopologyConfig, width: f64, height: f64) -> Self {
		let root = Position::new(config.layout.root_x, config.layout.root_y);
		let engine = MergeEngine::new(config.layout.clone(), Duration::seconds(config.activity_window_secs));
		let store = GraphStore::new(Some(root), width, height).with_stagger(config.stagger_ms);
		info!("topology view mounted ({width}x{height})");
		Self {
			config,
			engine,
			store,
			flight: SingleFlight::default(),
			cycles: 0,
		}
	}

	pub fn config(&self) -> &TopologyConfig {
		&self.config
	}

	pub fn store(&self) -> &GraphStore {
		&self.store
	}

	/// Presentation-only access for pointer handling and animation.
	pub fn store_mut(&mut self) -> &mut GraphStore {
		&mut self.store
	}

	pub fn cycles(&self) -> u64 {
		self.cycles
	}

	pub fn is_torn_down(&self) -> bool {
		self.flight.is_cancelled()
	}

	/// Issue a ticket for a poll about to start; supersedes earlier ones.
	pub fn begin_poll(&mut self) -> Option<PollTicket> {
		(!self.flight.is_cancelled()).then(|| self.flight.begin())
	}

	/// Full update path: normalize, merge, lay out and commit one poll result.
	pub fn on_poll_result(
		&mut self,
		ticket: PollTicket,
		result: TopologyResult<RecordBatch>,
		now: DateTime<Utc>,
	) -> CycleOutcome {
		if !self.flight.settle(ticket) {
			warn!("discarding stale poll response {ticket:?}");
			return CycleOutcome::Stale;
		}
		let batch = match result {
			Ok(batch) => batch,
			Err(e) => {
				warn!("poll failed, keeping current graph: {e}");
				return CycleOutcome::Retained;
			}
		};

		let fresh = normalize(&batch.agents, &batch.links);
		match self.engine.apply(&mut self.store, fresh, now) {
			Ok(summary) => {
				self.cycles += 1;
				if self.cycles == 1 {
					info!("first topology cycle applied: {} nodes", summary.added);
				}
				debug!(
					"cycle {}: +{} ~{} -{} (reappeared {}), {} edges ({} synthetic), {} placed, {} dropped",
					self.cycles,
					summary.added,
					summary.retained,
					summary.removed,
					summary.reappeared,
					summary.edges,
					summary.synthetic_edges,
					summary.placed,
					summary.dropped,
				);
				CycleOutcome::Applied(summary)
			}
			Err(e) => {
				warn!("{e}");
				CycleOutcome::Retained
			}
		}
	}

	/// Clock update path: freshness text and edge activity only.
	pub fn on_clock_tick(&mut self, now: DateTime<Utc>) {
		if self.flight.is_cancelled() {
			return;
		}
		let window = Duration::seconds(self.config.activity_window_secs);
		self.store.refresh_freshness(now, window);
	}

	/// Stop accepting results. In-flight polls settle as stale.
	pub fn teardown(&mut self) {
		if !self.flight.is_cancelled() {
			info!("topology view torn down after {} cycles", self.cycles);
		}
		self.flight.cancel();
	}
}
