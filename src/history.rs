//! Navigation history module.
//!
//! In-memory timelines and the nested history controllers that own them.
//!
//! # Examples
//!
//! ```rust
//! use trellis::history::{MemoryHistory, Action};
//!
//! let history = MemoryHistory::new();
//! history.push("/a", None).unwrap();
//! history.push("/b", None).unwrap();
//! history.go_back().unwrap();
//!
//! assert_eq!(history.action(), Action::Pop);
//! ```

pub use trellis_history::*;
