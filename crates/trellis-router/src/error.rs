//! Error types for routing and dispatch.

use thiserror::Error;
use trellis_history::HistoryError;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while building, matching or rendering a route tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RouterError {
	/// A history-level failure (malformed url, disposed controller, ...).
	#[error(transparent)]
	History(#[from] HistoryError),

	/// The path pattern could not be compiled.
	#[error("invalid route pattern '{pattern}': {reason}")]
	InvalidPattern {
		/// The offending pattern.
		pattern: String,
		/// Compilation failure.
		reason: String,
	},

	/// No route matched the url.
	#[error("no route matches url: {0}")]
	NotFound(String),

	/// A route that must render produced no view.
	#[error("route '{0}' produced no view")]
	EmptyView(String),

	/// A leaf route declares neither a view builder nor a redirect.
	#[error("route '{0}' has no view builder, redirect or children")]
	MissingBuild(String),

	/// A redirect chain exceeded the configured depth.
	#[error("redirect loop detected at '{path}' after {depth} redirects")]
	RedirectLoop {
		/// The redirect target that would have exceeded the limit.
		path: String,
		/// The configured maximum depth.
		depth: usize,
	},

	/// A home route is not usable as a seed url.
	#[error("invalid home route '{0}': home routes must be literal paths owned by their router")]
	InvalidHome(String),

	/// The url is not present in the router's history.
	#[error("url not found in history: {0}")]
	NotInHistory(String),

	/// The router was used before `start` (or before its parent started).
	#[error("router has not been initialized")]
	NotInitialized,

	/// `start` was called twice, or on a nested router.
	#[error("router has already been initialized")]
	AlreadyInitialized,

	/// A blocker decision is still outstanding.
	#[error("a navigation is already waiting for a blocker decision")]
	NavigationPending,

	/// Settings could not be loaded.
	#[error("settings error: {0}")]
	Settings(String),
}

impl RouterError {
	/// Returns `true` if the error reports a disposed router or controller.
	pub fn is_disposed(&self) -> bool {
		matches!(self, Self::History(HistoryError::Disposed))
	}
}
