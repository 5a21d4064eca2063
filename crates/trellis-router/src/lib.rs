//! Hierarchical routing for Trellis.
//!
//! A route tree is declared with [`Route`] and [`Router`] builders. Every
//! router owns a history scoped to its pattern; the histories form a tree
//! with bubble-up delegation (see [`trellis_history::HistoryController`]).
//! A committed transition dispatches the owning router, which matches its
//! subtree and renders the matched leaf.
//!
//! ## Features
//!
//! - **Pattern matching**: `:param`, optional, repeated and custom-regex
//!   segments, compiled once and cached per pattern and flags
//! - **Nested routers**: independent histories per router, home routes,
//!   `go_back` bubbling to the parent
//! - **Route lifecycle**: will-enter hooks from leaf to root, did-match,
//!   did-enter and did-exit hooks, cached views on back navigation
//! - **Redirects**: fixed or computed targets with a loop guard
//! - **Route blockers**: a tree-wide gate deciding each navigation,
//!   synchronously or later
//! - **Surface adapters**: presentation hooks for stack, tab or modal renderers
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis_router::{NavigationSettings, Route, Router};
//!
//! let router: Router<String> = Router::builder("/")
//! 	.home(Route::new("/home", |_, _| Some("home".to_string())))
//! 	.route(Route::new("/users/:id", |_, route| {
//! 		Some(format!("user {}", route.params()["id"]))
//! 	}))
//! 	.build();
//!
//! router.start(NavigationSettings::default()).unwrap();
//! router.push("/users/7", None, None).unwrap();
//!
//! let leaf = router.context().unwrap().last_route().unwrap();
//! assert_eq!(leaf.view().as_deref(), Some(&"user 7".to_string()));
//! ```

pub mod adapter;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod matching;
pub mod route;
pub mod router;
pub mod settings;
pub mod store;

pub use adapter::SurfaceAdapter;
pub use context::{BlockDone, BlockRequest, BlockerToken, NavigationContext, RouteBlocker};
pub use dispatch::RenderPass;
pub use error::{RouterError, RouterResult};
pub use matcher::{
	CompiledPattern, Key, KeyName, MatchOptions, PathMatch, PathMatcher, PatternScope,
	SharedMatcher, match_path,
};
pub use matching::{MatchedRoute, match_routes};
pub use route::{
	BuildFn, NodeKind, Redirect, Route, RouteBuilder, RouteEvent, RouteHook, RouteId,
	RouteState, RoutingStateFn,
};
pub use router::{Router, RouterBuilder};
pub use settings::{DEFAULT_MATCHER_CACHE_LIMIT, DEFAULT_MAX_REDIRECT_DEPTH, NavigationSettings};
pub use store::RouteStore;

pub use trellis_history::{Action, Location, PromptResult, PromptToken, UserConfirmation};
