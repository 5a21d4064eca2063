//! In-memory navigation history for Trellis.
//!
//! This crate provides the timeline layer of the routing engine:
//!
//! - **Locations**: structured `url`/`query`/`hash` values parsed from path strings
//! - **Memory history**: a stack-based timeline with a confirmation gate
//! - **History controllers**: one history per navigational node, with
//!   bubble-up delegation to the parent node
//!
//! # Quick Start
//!
//! ```rust
//! use trellis_history::{AnyPath, HistoryController};
//!
//! let root = HistoryController::new(AnyPath);
//! let inbox = root
//! 	.create_node(|url: &str| url.starts_with("/inbox"))
//! 	.unwrap();
//!
//! inbox.push("/inbox/1", None).unwrap();
//! // Not owned by the node, so the push bubbles to the root.
//! inbox.push("/settings", None).unwrap();
//!
//! assert_eq!(inbox.entries().unwrap().len(), 1);
//! assert_eq!(root.entries().unwrap().len(), 1);
//! ```

pub mod controller;
pub mod error;
pub mod location;
pub mod memory;

pub use controller::{AnyPath, HistoryController, PathScope};
pub use error::{HistoryError, HistoryResult};
pub use location::{Location, Query, strip_search};
pub use memory::{
	Action, ConfirmCallback, Listener, ListenerId, MemoryHistory, Prompt, PromptResult,
	PromptToken, UserConfirmation,
};
