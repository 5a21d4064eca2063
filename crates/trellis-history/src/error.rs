//! Error types for history operations.

use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised by locations, memory histories and history controllers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HistoryError {
	/// The url contains a malformed percent-encoded sequence.
	#[error("malformed url '{input}': {reason}")]
	MalformedUrl {
		/// The raw input that failed to decode.
		input: String,
		/// Why decoding failed.
		reason: String,
	},

	/// The controller was disposed and can no longer navigate.
	#[error("history controller has been disposed")]
	Disposed,

	/// Another transition is still waiting for a confirmation decision.
	#[error("a transition is already waiting for confirmation")]
	TransitionPending,

	/// No controller in the chain owns the url.
	#[error("no history controller can own url: {0}")]
	Unroutable(String),
}
