//! # Trellis
//!
//! Hierarchical routing with nested, independently navigable subtrees.
//!
//! Every router in a route tree owns its own navigation history. Histories
//! form a tree: a navigation a router cannot own bubbles up to the nearest
//! ancestor that can, and stepping back past the start of a nested history
//! steps back its parent instead.
//!
//! ## Feature Flags
//!
//! - `router` (default) - Route tree, pattern matching and dispatch
//!
//! Without `router` only the history layer is available.
//!
//! ## Crates
//!
//! - [`history`]: locations, memory history, history controllers
//! - [`router`]: routes, routers, path matcher, navigation settings
//!
//! ## Quick Example
//!
//! ```rust
//! # #[cfg(feature = "router")]
//! # {
//! use trellis::prelude::*;
//!
//! let inbox = Router::builder("/inbox")
//! 	.home(Route::new("all", |_, _| Some("all mail".to_string())))
//! 	.route(Route::new(":id", |_, route| Some(format!("mail {}", route.params()["id"]))))
//! 	.build();
//! let root = Router::builder("/")
//! 	.home(Route::new("/home", |_, _| Some("home".to_string())))
//! 	.route(inbox.clone())
//! 	.build();
//!
//! root.start(NavigationSettings::default()).unwrap();
//! inbox.push("/inbox/7", None, None).unwrap();
//!
//! // The nested router recorded the entry; the root history did not.
//! assert_eq!(inbox.history_as_array().unwrap().len(), 2);
//! assert_eq!(root.history_as_array().unwrap().len(), 1);
//! # }
//! ```

pub mod history;
#[cfg(feature = "router")]
pub mod router;

pub use trellis_history::{
	Action, HistoryController, HistoryError, HistoryResult, Location, MemoryHistory,
	PromptResult,
};

#[cfg(feature = "router")]
pub use trellis_router::{
	NavigationSettings, Route, RouteEvent, Router, RouterError, RouterResult, SurfaceAdapter,
};

/// Common imports.
pub mod prelude {
	pub use crate::{Action, HistoryController, Location, MemoryHistory, PromptResult};

	#[cfg(feature = "router")]
	pub use crate::{
		NavigationSettings, Route, RouteEvent, Router, RouterError, RouterResult, SurfaceAdapter,
	};
}
