//! Live agent topology: records in, positioned node/edge graph out.

mod component;
pub mod identity;
pub mod layout;
pub mod merge;
pub mod normalize;
pub mod recency;
mod render;
pub mod session;
pub mod source;
pub mod state;
pub mod types;

pub use component::TopologyCanvas;
pub use merge::{CycleSummary, MergeEngine};
pub use session::{CycleOutcome, TopologySession};
pub use state::GraphStore;
pub use types::{Edge, EdgeKind, GraphSnapshot, Node, Position, RecordBatch, ROOT_ID};
