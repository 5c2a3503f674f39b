//! Error type shared by the topology engine.

use thiserror::Error;

/// Everything that can go wrong while turning polled records into a graph.
///
/// None of these are fatal to the view: malformed records are dropped,
/// transport failures and layout precondition failures keep the last good
/// graph on screen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
	/// A record lacks an identity field it cannot be normalized without.
	#[error("record is missing required field `{0}`")]
	MissingField(&'static str),

	/// An agent record claims the identifier reserved for the root node.
	#[error("record id `{0}` is reserved for the root node")]
	ReservedId(String),

	/// A second agent record with an id already seen in the same batch.
	#[error("duplicate agent id `{0}` in batch")]
	DuplicateId(String),

	/// A timestamp that could not be parsed in any accepted shape.
	#[error("unparseable timestamp `{0}`")]
	Timestamp(String),

	/// The poll request itself failed.
	#[error("transport failure: {0}")]
	Transport(String),

	/// The poll response could not be decoded into records.
	#[error("invalid response payload: {0}")]
	Decode(String),

	/// Layout was asked to run without a root anchor.
	#[error("root node is not present; layout skipped")]
	RootMissing,

	/// Embedded configuration was not valid.
	#[error("invalid configuration: {0}")]
	Config(String),
}

/// Result alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
