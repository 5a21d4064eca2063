//! Routing module.
//!
//! Route trees, path matching, dispatch and surface adapters.
//!
//! # Examples
//!
//! ```rust
//! # #[cfg(feature = "router")]
//! # {
//! use trellis::router::{MatchOptions, match_path};
//!
//! let matched = match_path("/users/42", "/users/:id", MatchOptions::default())
//! 	.unwrap()
//! 	.unwrap();
//! assert_eq!(matched.param("id"), Some("42"));
//! # }
//! ```

#[cfg(feature = "router")]
pub use trellis_router::*;
