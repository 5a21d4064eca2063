//! Routers.
//!
//! A [`Router`] is a route node that owns a [`HistoryController`] scoped to
//! its pattern. Starting the root router builds the whole tree top-down:
//!
//! ```text
//! Router::start
//!     → resolve relative patterns
//!     → create the navigation context
//!     → for each router: create its controller (child node of the parent's),
//!       subscribe dispatch, validate its routes, seed its home route
//!     → render the root home route
//! ```
//!
//! Every committed history transition on a router's controller dispatches
//! that router (see [`Router::dispatch`]).

use crate::adapter::SurfaceAdapter;
use crate::context::{BlockDone, BlockRequest, BlockerToken, NavigationContext};
use crate::error::{RouterError, RouterResult};
use crate::matcher::PatternScope;
use crate::matching::MatchedRoute;
use crate::route::{NodeKind, Route, RouteBuilder, RouteEvent, RouteHook};
use crate::settings::NavigationSettings;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use trellis_history::{
	Action, HistoryController, HistoryError, Location, MemoryHistory, PromptResult, PromptToken,
	UserConfirmation, strip_search,
};

pub(crate) struct RouterCore<V: 'static> {
	pub(crate) home: Option<usize>,
	pub(crate) controller: RefCell<Option<HistoryController>>,
	pub(crate) context: RefCell<Option<Rc<NavigationContext<V>>>>,
	pub(crate) last_branch: RefCell<Vec<MatchedRoute<V>>>,
	pub(crate) did_match: Option<RouteHook<V>>,
	pub(crate) did_enter: Option<RouteHook<V>>,
	pub(crate) adapter: Option<Rc<dyn SurfaceAdapter<V>>>,
}

/// A route node owning a history and dispatching its subtree.
///
/// Cloning yields another handle to the same router.
pub struct Router<V: 'static> {
	route: Route<V>,
	core: Rc<RouterCore<V>>,
}

impl<V: 'static> Clone for Router<V> {
	fn clone(&self) -> Self {
		Self {
			route: self.route.clone(),
			core: Rc::clone(&self.core),
		}
	}
}

impl<V: 'static> std::fmt::Debug for Router<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Router")
			.field("route", &self.route)
			.field("home", &self.core.home)
			.field("started", &self.core.context.borrow().is_some())
			.field("disposed", &self.is_disposed())
			.field("has_adapter", &self.core.adapter.is_some())
			.finish()
	}
}

impl<V: 'static> std::ops::Deref for Router<V> {
	type Target = Route<V>;

	fn deref(&self) -> &Route<V> {
		&self.route
	}
}

impl<V: 'static> From<Router<V>> for Route<V> {
	fn from(router: Router<V>) -> Self {
		router.route
	}
}

impl<V: 'static> Router<V> {
	pub(crate) fn from_parts(route: Route<V>, core: Rc<RouterCore<V>>) -> Self {
		Self { route, core }
	}

	/// Starts building a router matching `pattern` as a prefix.
	pub fn builder(pattern: impl Into<String>) -> RouterBuilder<V> {
		RouterBuilder::new(pattern.into())
	}

	/// The route node of this router.
	pub fn route(&self) -> &Route<V> {
		&self.route
	}

	pub(crate) fn core(&self) -> &RouterCore<V> {
		&self.core
	}

	pub fn ptr_eq(&self, other: &Router<V>) -> bool {
		self.route.ptr_eq(&other.route)
	}

	/// The enclosing router; `None` for the root.
	pub fn parent(&self) -> Option<Router<V>> {
		self.route.owner()
	}

	/// The designated home route.
	pub fn home(&self) -> Option<Route<V>> {
		self.core
			.home
			.and_then(|index| self.route.children().get(index).cloned())
	}

	/// The navigation context shared by the tree.
	///
	/// # Errors
	///
	/// Returns [`RouterError::NotInitialized`] before the tree has started.
	pub fn context(&self) -> RouterResult<Rc<NavigationContext<V>>> {
		self.core
			.context
			.borrow()
			.clone()
			.ok_or(RouterError::NotInitialized)
	}

	/// This router's history controller.
	///
	/// # Errors
	///
	/// Fails before the tree has started and after [`dispose`](Self::dispose).
	pub fn controller(&self) -> RouterResult<HistoryController> {
		let controller = self
			.core
			.controller
			.borrow()
			.clone()
			.ok_or(RouterError::NotInitialized)?;
		if controller.is_disposed() {
			return Err(HistoryError::Disposed.into());
		}
		Ok(controller)
	}

	pub fn is_disposed(&self) -> bool {
		self.core
			.controller
			.borrow()
			.as_ref()
			.is_some_and(HistoryController::is_disposed)
	}

	/// Whether this router committed the last navigation.
	pub fn is_active(&self) -> bool {
		self.context()
			.ok()
			.and_then(|ctx| ctx.active_router())
			.is_some_and(|active| active.ptr_eq(self))
	}

	/// The current entry of this router's history.
	pub fn location(&self) -> RouterResult<Option<Location>> {
		Ok(self.controller()?.location()?)
	}

	/// The branch computed by the last dispatch of this router.
	pub fn last_branch(&self) -> Vec<MatchedRoute<V>> {
		self.core.last_branch.borrow().clone()
	}

	pub fn adapter(&self) -> Option<Rc<dyn SurfaceAdapter<V>>> {
		self.core.adapter.clone()
	}

	/// Starts the tree rooted at this router and renders its home route.
	///
	/// # Errors
	///
	/// Fails on invalid patterns, leaf routes without a view builder, invalid
	/// home routes, a nested or already started router, and any failure of
	/// the initial render.
	pub fn start(&self, settings: NavigationSettings) -> RouterResult<()> {
		self.start_with(settings, None)
	}

	/// Like [`start`](Self::start), installing `confirmation` on every
	/// history of the tree for [`PromptResult::Confirm`] prompts.
	pub fn start_with_confirmation(
		&self,
		settings: NavigationSettings,
		confirmation: UserConfirmation,
	) -> RouterResult<()> {
		self.start_with(settings, Some(confirmation))
	}

	fn start_with(
		&self,
		settings: NavigationSettings,
		confirmation: Option<UserConfirmation>,
	) -> RouterResult<()> {
		if self.core.context.borrow().is_some() || self.parent().is_some() {
			return Err(RouterError::AlreadyInitialized);
		}

		self.route.resolve_patterns(None);
		let ctx = NavigationContext::new(settings, confirmation);
		self.initialize(&ctx, None)?;
		tracing::info!(pattern = %self.route.label(), "router tree started");

		if let Some(url) = self.home_url(&ctx)? {
			let controller = self.controller()?;
			if !controller.can_push(&url) {
				return Err(RouterError::InvalidHome(url));
			}
			ctx.set_animated(Some(false));
			controller.push(&url, None)?;
			if let Some(err) = ctx.take_error() {
				return Err(err);
			}
		}
		Ok(())
	}

	fn initialize(
		&self,
		ctx: &Rc<NavigationContext<V>>,
		parent: Option<&Router<V>>,
	) -> RouterResult<()> {
		if self.core.context.borrow().is_some() {
			return Err(RouterError::AlreadyInitialized);
		}

		let pattern = self.route.resolved_pattern().unwrap_or("/").to_string();
		ctx.compile(&pattern, self.route.options())?;
		let scope = PatternScope::new(ctx.matcher(), pattern, self.route.options());
		let controller = match parent {
			Some(parent) => parent.controller()?.create_node(scope)?,
			None => HistoryController::with_history(
				MemoryHistory::new().with_confirmation(ctx.confirmation()),
				scope,
			),
		};
		*self.core.context.borrow_mut() = Some(Rc::clone(ctx));
		*self.core.controller.borrow_mut() = Some(controller.clone());

		let weak = Rc::downgrade(&self.route.inner);
		controller.listen(move |location, action| {
			let Some(router) = weak.upgrade().and_then(|inner| Route { inner }.as_router()) else {
				return;
			};
			if let Err(err) = router.dispatch(location, action) {
				match router.context() {
					Ok(ctx) => ctx.report(err),
					Err(_) => tracing::error!(error = %err, "dispatch failed on a detached router"),
				}
			}
		})?;

		for child in self.route.children() {
			self.prepare(ctx, &child)?;
		}

		if parent.is_some()
			&& let Some(url) = self.home_url(ctx)?
		{
			if !controller.can_push(&url) {
				return Err(RouterError::InvalidHome(url));
			}
			controller.prevent_default();
			controller.push(&url, None)?;
			tracing::debug!(%url, "seeded nested home route");
		}
		Ok(())
	}

	/// Validates `node` and its subtree as routes of this router.
	pub(crate) fn prepare(&self, ctx: &Rc<NavigationContext<V>>, node: &Route<V>) -> RouterResult<()> {
		node.set_owner(self);
		if let Some(router) = node.as_router() {
			return router.initialize(ctx, Some(self));
		}

		if let Some(pattern) = node.resolved_pattern() {
			ctx.compile(pattern, node.options())?;
		}
		let children = node.children();
		if children.is_empty() && !node.has_build() && node.redirect_target().is_none() {
			return Err(RouterError::MissingBuild(node.label()));
		}
		for child in &children {
			self.prepare(ctx, child)?;
		}
		Ok(())
	}

	pub(crate) fn home_url(&self, ctx: &NavigationContext<V>) -> RouterResult<Option<String>> {
		let Some(home) = self.home() else {
			return Ok(None);
		};
		let Some(pattern) = home.resolved_pattern() else {
			return Err(RouterError::InvalidHome(home.label()));
		};
		if pattern.contains('\\') || !ctx.compile(pattern, home.options())? {
			return Err(RouterError::InvalidHome(pattern.to_string()));
		}
		Ok(Some(pattern.to_string()))
	}

	/// Navigates to `path`, pushing a new entry.
	///
	/// The push commits on this router's history if its pattern owns `path`,
	/// otherwise on the nearest ancestor that does. An installed route
	/// blocker decides first.
	///
	/// # Errors
	///
	/// Fails on a malformed path, after `dispose`, while a blocker decision is
	/// pending, and with any error raised while rendering the result.
	pub fn push(
		&self,
		path: &str,
		route_data: Option<Value>,
		animated: Option<bool>,
	) -> RouterResult<()> {
		let ctx = self.context()?;
		let controller = self.controller()?;
		let request = BlockRequest {
			path: Some(path.to_string()),
			route_data: route_data.clone(),
			action: Action::Push,
		};
		let path = path.to_string();
		ctx.navigate(
			request,
			Box::new(move |ctx| {
				ctx.set_animated(animated);
				controller.push(&path, route_data)?;
				Ok(())
			}),
		)
	}

	/// Navigates to `path`, overwriting the current entry.
	pub fn replace(
		&self,
		path: &str,
		route_data: Option<Value>,
		animated: Option<bool>,
	) -> RouterResult<()> {
		let ctx = self.context()?;
		let controller = self.controller()?;
		let request = BlockRequest {
			path: Some(path.to_string()),
			route_data: route_data.clone(),
			action: Action::Replace,
		};
		let path = path.to_string();
		ctx.navigate(
			request,
			Box::new(move |ctx| {
				ctx.set_animated(animated);
				controller.replace(&path, route_data)?;
				Ok(())
			}),
		)
	}

	/// Steps back one entry, or back to the latest earlier entry for `url`.
	///
	/// With nothing to step back to locally, the parent router steps back.
	pub fn go_back(&self, url: Option<&str>, animated: Option<bool>) -> RouterResult<()> {
		if let Some(url) = url {
			return self.go_back_to_url_animated(url, animated);
		}

		let ctx = self.context()?;
		let controller = self.controller()?;
		let history = controller.history()?;
		let path = history
			.index()
			.and_then(|index| index.checked_sub(1))
			.and_then(|index| history.entries().get(index).map(Location::href));
		let request = BlockRequest {
			path,
			route_data: None,
			action: Action::Pop,
		};
		ctx.navigate(
			request,
			Box::new(move |ctx| {
				ctx.set_animated(animated);
				controller.go_back()?;
				Ok(())
			}),
		)
	}

	/// Steps back `n` entries of this router's history, clamped to the
	/// first entry.
	pub fn go_back_to(&self, n: usize) -> RouterResult<()> {
		let ctx = self.context()?;
		let controller = self.controller()?;
		let history = controller.history()?;
		let path = history
			.index()
			.map(|index| index.saturating_sub(n))
			.and_then(|index| history.entries().get(index).map(Location::href));
		let delta = -isize::try_from(n).unwrap_or(isize::MAX);
		let request = BlockRequest {
			path,
			route_data: None,
			action: Action::Pop,
		};
		ctx.navigate(
			request,
			Box::new(move |_| {
				controller.go(delta)?;
				Ok(())
			}),
		)
	}

	/// Steps back to the latest earlier entry whose url is `url`.
	///
	/// # Errors
	///
	/// Returns [`RouterError::NotInHistory`] when no earlier entry matches.
	pub fn go_back_to_url(&self, url: &str) -> RouterResult<()> {
		self.go_back_to_url_animated(url, None)
	}

	fn go_back_to_url_animated(&self, url: &str, animated: Option<bool>) -> RouterResult<()> {
		let ctx = self.context()?;
		let controller = self.controller()?;
		let history = controller.history()?;
		let entries = history.entries();
		let current = history.index().unwrap_or(0);
		let pathname = strip_search(url);

		let target = entries[..current]
			.iter()
			.rposition(|location| location.url == pathname)
			.ok_or_else(|| RouterError::NotInHistory(url.to_string()))?;
		// Indices are bounded by the history length.
		let delta = target as isize - current as isize;

		let request = BlockRequest {
			path: Some(entries[target].href()),
			route_data: None,
			action: Action::Pop,
		};
		ctx.navigate(
			request,
			Box::new(move |ctx| {
				ctx.set_animated(animated);
				controller.go(delta)?;
				Ok(())
			}),
		)
	}

	/// Subscribes to committed transitions of this router's history. The
	/// listener runs after dispatch.
	pub fn listen<F>(&self, listener: F) -> RouterResult<u64>
	where
		F: Fn(&Location, Action) + 'static,
	{
		Ok(self.controller()?.listen(listener)?)
	}

	pub fn unlisten(&self, id: u64) -> RouterResult<bool> {
		Ok(self.controller()?.unlisten(id))
	}

	/// Installs the tree-wide route blocker, replacing any previous one.
	///
	/// Every `push`/`go_back` is handed to `blocker` with a `done` callback;
	/// only `done(true)` lets it proceed.
	pub fn add_route_blocker<F>(&self, blocker: F) -> RouterResult<BlockerToken>
	where
		F: Fn(&BlockRequest, BlockDone) + 'static,
	{
		self.controller()?;
		Ok(self.context()?.add_blocker(Rc::new(blocker)))
	}

	/// Removes the blocker installed with `token`.
	pub fn remove_route_blocker(&self, token: BlockerToken) -> bool {
		self.context()
			.map(|ctx| ctx.remove_blocker(token))
			.unwrap_or(false)
	}

	/// Installs a transition prompt on this router's own history.
	pub fn block_transitions<F>(&self, prompt: F) -> RouterResult<PromptToken>
	where
		F: Fn(&Location, Action) -> PromptResult + 'static,
	{
		Ok(self.controller()?.block(prompt)?)
	}

	pub fn unblock_transitions(&self, token: PromptToken) -> RouterResult<bool> {
		Ok(self.controller()?.unblock(token)?)
	}

	/// Every entry of this router's history.
	pub fn history_as_array(&self) -> RouterResult<Vec<Location>> {
		Ok(self.controller()?.entries()?)
	}

	/// Takes a failure recorded after an asynchronous blocker decision.
	pub fn take_error(&self) -> Option<RouterError> {
		self.context().ok().and_then(|ctx| ctx.take_error())
	}

	/// Disposes this router's history and every nested router's.
	///
	/// Later navigation calls on the subtree fail with a disposed error.
	pub fn dispose(&self) {
		let Some(controller) = self.core.controller.borrow().clone() else {
			return;
		};
		controller.dispose();
		self.core.last_branch.borrow_mut().clear();
		if self.parent().is_none()
			&& let Ok(ctx) = self.context()
		{
			ctx.clear();
		}
		tracing::debug!(pattern = %self.route.label(), "router disposed");
	}
}

/// Builder for [`Router`].
pub struct RouterBuilder<V: 'static> {
	base: RouteBuilder<V>,
	home: Option<usize>,
	did_match: Option<RouteHook<V>>,
	did_enter: Option<RouteHook<V>>,
	adapter: Option<Rc<dyn SurfaceAdapter<V>>>,
}

impl<V: 'static> RouterBuilder<V> {
	fn new(pattern: String) -> Self {
		Self {
			base: RouteBuilder::new(Some(pattern)),
			home: None,
			did_match: None,
			did_enter: None,
			adapter: None,
		}
	}

	pub fn exact(mut self, exact: bool) -> Self {
		self.base = self.base.exact(exact);
		self
	}

	pub fn strict(mut self, strict: bool) -> Self {
		self.base = self.base.strict(strict);
		self
	}

	pub fn sensitive(mut self, sensitive: bool) -> Self {
		self.base = self.base.sensitive(sensitive);
		self
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.base = self.base.name(name);
		self
	}

	/// Adds a child route or router. Declaration order is match priority.
	pub fn route(mut self, child: impl Into<Route<V>>) -> Self {
		self.base = self.base.child(child);
		self
	}

	/// Adds several children.
	pub fn routes<I, R>(mut self, children: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: Into<Route<V>>,
	{
		self.base = self.base.children(children);
		self
	}

	/// Adds a child and makes it the home route. Its pattern must be a
	/// literal path.
	pub fn home(mut self, child: impl Into<Route<V>>) -> Self {
		if self.home.is_some() {
			tracing::warn!("home route already set; replacing it");
		}
		self.home = Some(self.base.children.len());
		self.base = self.base.child(child);
		self
	}

	/// Hook run when this router's will-enter task runs.
	pub fn on_will_enter<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.base = self.base.on_will_enter(hook);
		self
	}

	/// Hook run when a leaf of this router matched, before its view is built.
	pub fn on_did_match<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.did_match = Some(Rc::new(hook));
		self
	}

	/// Hook run after a leaf of this router entered.
	pub fn on_did_enter<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.did_enter = Some(Rc::new(hook));
		self
	}

	pub fn adapter(mut self, adapter: impl SurfaceAdapter<V> + 'static) -> Self {
		self.adapter = Some(Rc::new(adapter));
		self
	}

	pub fn build(self) -> Router<V> {
		let core = Rc::new(RouterCore {
			home: self.home,
			controller: RefCell::new(None),
			context: RefCell::new(None),
			last_branch: RefCell::new(Vec::new()),
			did_match: self.did_match,
			did_enter: self.did_enter,
			adapter: self.adapter,
		});
		let route = self.base.into_node(NodeKind::Router, Some(Rc::clone(&core)));
		Router { route, core }
	}
}
