//! Dispatch and rendering.
//!
//! A committed transition on a router's history dispatches that router:
//!
//! ```text
//! dispatch(location, action)
//!     → match_routes          branch root..leaf, first match wins per level
//!     → render_matches        routers delegate the remainder downwards
//!     → render_leaf           redirect | commit state | sync nested history
//!                             | did_exit(prev) | did_match | build view
//!                             | will_enter (leaf → root) | did_enter
//! ```
//!
//! Every node on the branch queues a will-enter task; the queue runs in
//! reverse once the leaf's view exists, so the leaf's hook fires first and
//! the dispatching router's last.

use crate::error::{RouterError, RouterResult};
use crate::matching::{MatchedRoute, match_routes};
use crate::route::{Route, RouteEvent};
use crate::router::Router;
use std::rc::Rc;
use trellis_history::{Action, HistoryController, HistoryResult, Location};

/// State carried through one dispatch.
pub struct RenderPass<V: 'static> {
	target: Router<V>,
	location: Location,
	action: Action,
	animated: bool,
	tasks: Vec<Route<V>>,
}

impl<V: 'static> std::fmt::Debug for RenderPass<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderPass")
			.field("target", &self.target.label())
			.field("location", &self.location)
			.field("action", &self.action)
			.field("animated", &self.animated)
			.field("tasks", &self.tasks.len())
			.finish()
	}
}

impl<V: 'static> RenderPass<V> {
	pub fn new(target: Router<V>, location: Location, action: Action, animated: bool) -> Self {
		Self {
			target,
			location,
			action,
			animated,
			tasks: Vec::new(),
		}
	}

	/// The router whose history committed the transition.
	pub fn target(&self) -> &Router<V> {
		&self.target
	}

	pub fn location(&self) -> &Location {
		&self.location
	}

	pub fn action(&self) -> Action {
		self.action
	}

	pub fn animated(&self) -> bool {
		self.animated
	}

	/// Number of queued will-enter tasks.
	pub fn queued(&self) -> usize {
		self.tasks.len()
	}
}

impl<V: 'static> Router<V> {
	/// Matches `location` against this router's subtree and renders the
	/// resulting branch.
	///
	/// # Errors
	///
	/// Returns [`RouterError::NotFound`] when nothing matches, and any error
	/// of rendering.
	pub fn dispatch(&self, location: &Location, action: Action) -> RouterResult<()> {
		let ctx = self.context()?;
		let branch = match_routes(&ctx, std::slice::from_ref(self.route()), &location.url)?;
		if branch.is_empty() {
			tracing::warn!(url = %location.url, router = %self.label(), "no route matched");
			return Err(RouterError::NotFound(location.url.clone()));
		}

		tracing::debug!(url = %location.url, %action, depth = branch.len(), "dispatching");
		*self.core().last_branch.borrow_mut() = branch.clone();
		let mut pass = RenderPass::new(self.clone(), location.clone(), action, ctx.take_animated());
		self.render_matches(&branch, &mut pass)
	}

	/// Renders `branch`, whose head is this router.
	///
	/// Nested routers on the branch render the remainder starting at
	/// themselves.
	pub fn render_matches(
		&self,
		branch: &[MatchedRoute<V>],
		pass: &mut RenderPass<V>,
	) -> RouterResult<()> {
		let Some((head, rest)) = branch.split_first() else {
			return Err(RouterError::NotFound(pass.location.url.clone()));
		};
		record(head, pass);
		pass.tasks.push(self.route().clone());

		if rest.is_empty() {
			let ctx = self.context()?;
			if head.matched.is_exact
				&& let Some(home) = self.home_url(&ctx)?
				&& home != pass.location.url
			{
				tracing::debug!(url = %pass.location.url, %home, "router matched exactly; entering home");
				return self.redirect(&home, pass);
			}
			tracing::warn!(url = %pass.location.url, router = %self.label(), "router matched without a leaf");
			return Err(RouterError::NotFound(pass.location.url.clone()));
		}

		for (offset, entry) in rest.iter().enumerate() {
			if let Some(router) = entry.route.as_router() {
				return router.render_matches(&rest[offset..], pass);
			}
			if offset + 1 == rest.len() {
				return self.render_leaf(entry, pass);
			}
			record(entry, pass);
			pass.tasks.push(entry.route.clone());
		}
		Ok(())
	}

	fn render_leaf(&self, entry: &MatchedRoute<V>, pass: &mut RenderPass<V>) -> RouterResult<()> {
		let ctx = self.context()?;
		let route = &entry.route;
		let location = pass.location.clone();
		let action = pass.action;

		if !entry.matched.is_exact {
			tracing::warn!(url = %location.url, route = %route.label(), "branch ends on a partial match");
			return Err(RouterError::NotFound(location.url.clone()));
		}

		if let Some(to) = route
			.redirect_target()
			.and_then(|redirect| redirect.resolve(self, route))
		{
			// Relative targets resolve against the location being rendered,
			// which a push rolls back before following the redirect.
			let to = if to.starts_with('/') {
				to
			} else {
				Location::resolve(&to, Some(&location))?.href()
			};
			if to != location.url && to != location.href() {
				tracing::debug!(from = %location.url, %to, "redirecting");
				return self.redirect(&to, pass);
			}
		}

		ctx.set_active_router(self);
		ctx.reset_redirects();
		let previous = ctx.last_route();
		let prev_url = previous.as_ref().and_then(|prev| prev.state().url.clone());
		{
			let mut state = route.state_mut();
			state.matched = Some(entry.matched.clone());
			state.query = location.query.clone();
			state.raw_query = location.raw_query.clone();
			state.hash = location.hash.clone();
			state.route_data = location.state.clone();
			state.action = Some(action);
			state.url = Some(entry.matched.url.clone());
			state.prev_url = prev_url;
			state.active = true;
		}
		// Computed after the commit so it sees the new params.
		let routing_state = route
			.routing_state_fn()
			.and_then(|compute| compute(self, route));
		route.state_mut().routing_state = routing_state;

		let mut router = Some(self.clone());
		while let Some(current) = router {
			if current.ptr_eq(&pass.target) {
				break;
			}
			current.sync_history(pass)?;
			router = current.parent();
		}
		pass.tasks.push(route.clone());

		if let Some(previous) = previous.filter(|prev| !prev.ptr_eq(route)) {
			previous.state_mut().active = false;
			if let Some(hook) = &previous.hooks().did_exit {
				let owner = previous.owner().unwrap_or_else(|| self.clone());
				hook(&RouteEvent {
					router: &owner,
					route: &previous,
					location: &location,
					action,
				});
			}
		}

		let event = RouteEvent {
			router: self,
			route,
			location: &location,
			action,
		};
		if let Some(hook) = &self.core().did_match {
			hook(&event);
		}

		let cached = match action {
			Action::Pop => route.view(),
			Action::Push | Action::Replace => None,
		};
		let view = match cached {
			Some(view) => {
				tracing::trace!(url = %location.url, "reusing cached view");
				view
			}
			None => {
				let build = route
					.build_fn()
					.ok_or_else(|| RouterError::EmptyView(route.label()))?;
				let view = Rc::new(build(self, route).ok_or_else(|| RouterError::EmptyView(route.label()))?);
				route.state_mut().view = Some(Rc::clone(&view));
				view
			}
		};

		let tasks = std::mem::take(&mut pass.tasks);
		for node in tasks.iter().rev() {
			self.run_will_enter(node, route, &location, action);
		}

		if let Some(hook) = &self.core().did_enter {
			hook(&event);
		}
		if let Some(hook) = &route.hooks().did_enter {
			hook(&event);
		}
		if let Some(adapter) = self.adapter() {
			adapter.on_route_enter(self, route, &view, action, pass.animated);
		}
		ctx.set_last_route(route.clone());
		tracing::debug!(url = %location.url, route = %route.label(), %action, "route entered");
		Ok(())
	}

	fn run_will_enter(&self, node: &Route<V>, leaf: &Route<V>, location: &Location, action: Action) {
		let router = node.as_router();
		if let Some(hook) = &node.hooks().will_enter {
			let owner = router
				.clone()
				.or_else(|| node.owner())
				.unwrap_or_else(|| self.clone());
			hook(&RouteEvent {
				router: &owner,
				route: node,
				location,
				action,
			});
		}
		if let Some(router) = router
			&& let Some(adapter) = router.adapter()
		{
			adapter.route_will_enter(&router, leaf);
		}
	}

	/// Replaces the rendered transition with one towards `to`.
	fn redirect(&self, to: &str, pass: &RenderPass<V>) -> RouterResult<()> {
		let ctx = self.context()?;
		let controller = pass.target.controller()?;
		if let Err(err) = ctx.enter_redirect(to) {
			if pass.action == Action::Push {
				controller.rollback()?;
			}
			return Err(err);
		}

		ctx.set_animated(Some(pass.animated));
		let data = pass.location.state.clone();
		match pass.action {
			Action::Push => {
				controller.rollback()?;
				controller.push(to, data)?;
			}
			Action::Replace | Action::Pop => controller.replace(to, data)?,
		}
		Ok(())
	}

	/// Mirrors a transition committed above this router into its own
	/// history without dispatching it again.
	fn sync_history(&self, pass: &RenderPass<V>) -> RouterResult<()> {
		let controller = self.controller()?;
		let history = controller.history()?;
		let location = &pass.location;
		let href = location.href();

		if pass.action == Action::Replace {
			return silently(&controller, |c| c.replace(&href, location.state.clone()));
		}

		let entries = history.entries();
		let current = history.index();
		let on_current = current
			.and_then(|index| entries.get(index))
			.is_some_and(|entry| entry.url == location.url);
		let found = match pass.action {
			Action::Pop => entries.iter().rposition(|entry| entry.url == location.url),
			Action::Push | Action::Replace => None,
		};

		match (found, current) {
			(Some(index), Some(current)) if index != current => {
				// Indices are bounded by the history length.
				let delta = index as isize - current as isize;
				silently(&controller, |c| c.go(delta))
			}
			_ if on_current => Ok(()),
			_ => silently(&controller, |c| c.push(&href, location.state.clone())),
		}
	}
}

fn silently(
	controller: &HistoryController,
	transition: impl FnOnce(&HistoryController) -> HistoryResult<()>,
) -> RouterResult<()> {
	controller.prevent_default();
	let result = transition(controller);
	controller.allow_default();
	Ok(result?)
}

/// Refreshes the match data of an inner node of the branch.
fn record<V: 'static>(entry: &MatchedRoute<V>, pass: &RenderPass<V>) {
	let mut state = entry.route.state_mut();
	state.matched = Some(entry.matched.clone());
	state.query = pass.location.query.clone();
	state.raw_query = pass.location.raw_query.clone();
	state.hash = pass.location.hash.clone();
	state.action = Some(pass.action);
	state.url = Some(entry.matched.url.clone());
}
