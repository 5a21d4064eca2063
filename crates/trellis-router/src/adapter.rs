//! Surface adapters.
//!
//! The engine never presents views itself. A stack, tab or modal renderer
//! implements [`SurfaceAdapter`] and is attached to a router with
//! [`RouterBuilder::adapter`](crate::router::RouterBuilder::adapter).

use crate::route::Route;
use crate::router::Router;
use std::rc::Rc;
use trellis_history::Action;

pub trait SurfaceAdapter<V: 'static> {
	/// Called when the router's will-enter task runs, with the leaf route
	/// being entered.
	fn route_will_enter(&self, _router: &Router<V>, _route: &Route<V>) {}

	/// Called after the leaf's enter hooks with the rendered view.
	fn on_route_enter(
		&self,
		_router: &Router<V>,
		_route: &Route<V>,
		_view: &Rc<V>,
		_action: Action,
		_animated: bool,
	) {
	}
}
