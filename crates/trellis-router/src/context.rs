//! Tree-wide navigation context.
//!
//! One [`NavigationContext`] is created when the root router starts and is
//! shared by every router of that tree. It carries the matcher, the route
//! store, the active router, the last committed route, the navigation
//! blocker and the error slot for failures raised inside history listeners.

use crate::error::{RouterError, RouterResult};
use crate::matcher::{MatchOptions, PathMatch, PathMatcher, SharedMatcher};
use crate::route::{Route, RouteInner};
use crate::router::Router;
use crate::settings::NavigationSettings;
use crate::store::RouteStore;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use trellis_history::{Action, UserConfirmation};

/// A navigation intercepted by the blocker.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRequest {
	/// Target path, when known up front.
	pub path: Option<String>,
	/// Route data passed to `push`.
	pub route_data: Option<Value>,
	pub action: Action,
}

/// Decision callback handed to a blocker; `true` lets the navigation proceed.
pub type BlockDone = Box<dyn FnOnce(bool)>;

/// Navigation blocker. It may call `done` later.
pub type RouteBlocker = Rc<dyn Fn(&BlockRequest, BlockDone)>;

/// Token returned when installing a blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockerToken(u64);

pub(crate) type Proceed<V> = Box<dyn FnOnce(&NavigationContext<V>) -> RouterResult<()>>;

pub struct NavigationContext<V: 'static> {
	settings: NavigationSettings,
	matcher: SharedMatcher,
	store: RefCell<RouteStore<V>>,
	confirmation: Option<UserConfirmation>,
	active_router: RefCell<Weak<RouteInner<V>>>,
	last_route: RefCell<Option<Route<V>>>,
	blocker: RefCell<Option<(BlockerToken, RouteBlocker)>>,
	next_blocker: Cell<u64>,
	pending: Cell<bool>,
	redirect_depth: Cell<usize>,
	animated: Cell<Option<bool>>,
	error: RefCell<Option<RouterError>>,
}

impl<V: 'static> std::fmt::Debug for NavigationContext<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NavigationContext")
			.field("settings", &self.settings)
			.field("stored_routes", &self.store.borrow().len())
			.field("has_blocker", &self.blocker.borrow().is_some())
			.field("pending", &self.pending.get())
			.field("redirect_depth", &self.redirect_depth.get())
			.finish()
	}
}

impl<V: 'static> NavigationContext<V> {
	pub(crate) fn new(
		settings: NavigationSettings,
		confirmation: Option<UserConfirmation>,
	) -> Rc<Self> {
		Rc::new(Self {
			matcher: PathMatcher::shared(settings.matcher_cache_limit),
			settings,
			store: RefCell::new(RouteStore::new()),
			confirmation,
			active_router: RefCell::new(Weak::new()),
			last_route: RefCell::new(None),
			blocker: RefCell::new(None),
			next_blocker: Cell::new(0),
			pending: Cell::new(false),
			redirect_depth: Cell::new(0),
			animated: Cell::new(None),
			error: RefCell::new(None),
		})
	}

	pub fn settings(&self) -> &NavigationSettings {
		&self.settings
	}

	pub fn matcher(&self) -> SharedMatcher {
		Rc::clone(&self.matcher)
	}

	pub fn confirmation(&self) -> Option<UserConfirmation> {
		self.confirmation.clone()
	}

	/// Matches through the shared, cached matcher.
	pub fn match_path(
		&self,
		pathname: &str,
		pattern: &str,
		options: MatchOptions,
	) -> RouterResult<Option<PathMatch>> {
		self.matcher
			.borrow_mut()
			.match_path(pathname, pattern, options)
	}

	/// Compiles `pattern`, returning whether it is free of parameters.
	pub(crate) fn compile(&self, pattern: &str, options: MatchOptions) -> RouterResult<bool> {
		let compiled = self.matcher.borrow_mut().compile(pattern, options)?;
		Ok(compiled.is_literal())
	}

	/// Returns the store instance of `route` for `url`.
	pub(crate) fn intern(&self, route: &Route<V>, url: &str) -> Route<V> {
		self.store.borrow_mut().intern(route, url)
	}

	/// Number of interned route instances.
	pub fn stored_routes(&self) -> usize {
		self.store.borrow().len()
	}

	/// The router that committed the last navigation.
	pub fn active_router(&self) -> Option<Router<V>> {
		self.active_router
			.borrow()
			.upgrade()
			.and_then(|inner| Route { inner }.as_router())
	}

	pub(crate) fn set_active_router(&self, router: &Router<V>) {
		*self.active_router.borrow_mut() = Rc::downgrade(&router.route().inner);
	}

	/// The route committed by the last navigation.
	pub fn last_route(&self) -> Option<Route<V>> {
		self.last_route.borrow().clone()
	}

	pub(crate) fn set_last_route(&self, route: Route<V>) {
		*self.last_route.borrow_mut() = Some(route);
	}

	pub(crate) fn add_blocker(&self, blocker: RouteBlocker) -> BlockerToken {
		let token = BlockerToken(self.next_blocker.get());
		self.next_blocker.set(token.0 + 1);
		if self.blocker.replace(Some((token, blocker))).is_some() {
			tracing::warn!("a route blocker is already installed; replacing it");
		}
		token
	}

	pub(crate) fn remove_blocker(&self, token: BlockerToken) -> bool {
		let mut blocker = self.blocker.borrow_mut();
		match blocker.as_ref() {
			Some((current, _)) if *current == token => {
				*blocker = None;
				true
			}
			_ => false,
		}
	}

	pub fn has_blocker(&self) -> bool {
		self.blocker.borrow().is_some()
	}

	/// Whether a blocker decision is outstanding.
	pub fn is_pending(&self) -> bool {
		self.pending.get()
	}

	/// Runs `proceed` unless the installed blocker rejects the request.
	///
	/// A blocker deciding synchronously yields the navigation's own result.
	/// A blocker deciding later leaves the call returning `Ok(())`; any later
	/// failure is logged and kept for [`take_error`](Self::take_error).
	pub(crate) fn navigate(self: &Rc<Self>, request: BlockRequest, proceed: Proceed<V>) -> RouterResult<()> {
		if self.pending.get() {
			return Err(RouterError::NavigationPending);
		}
		self.error.borrow_mut().take();
		self.redirect_depth.set(0);

		let blocker = self
			.blocker
			.borrow()
			.as_ref()
			.map(|(_, blocker)| Rc::clone(blocker));
		let Some(blocker) = blocker else {
			return self.proceed(proceed);
		};

		self.pending.set(true);
		let outcome: Rc<RefCell<Option<RouterResult<()>>>> = Rc::new(RefCell::new(None));
		let returned = Rc::new(Cell::new(false));
		let weak = Rc::downgrade(self);
		let slot = Rc::clone(&outcome);
		let late = Rc::clone(&returned);
		let action = request.action;

		blocker(
			&request,
			Box::new(move |allow| {
				let Some(ctx) = weak.upgrade() else {
					return;
				};
				ctx.pending.set(false);
				let result = if allow {
					ctx.proceed(proceed)
				} else {
					tracing::debug!(%action, "navigation blocked");
					Ok(())
				};
				if !late.get() {
					*slot.borrow_mut() = Some(result);
				} else if let Err(err) = result {
					tracing::error!(error = %err, "navigation failed after blocker decision");
					ctx.report(err);
				}
			}),
		);
		returned.set(true);

		let result = outcome.borrow_mut().take();
		match result {
			Some(result) => result,
			None => {
				tracing::debug!(action = %request.action, "navigation waiting for blocker decision");
				Ok(())
			}
		}
	}

	fn proceed(&self, proceed: Proceed<V>) -> RouterResult<()> {
		// A flag left by a navigation that committed nothing must not leak.
		self.animated.set(None);
		proceed(self)?;
		match self.take_error() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	/// Records a failure raised where it cannot be returned directly.
	///
	/// Only the first failure of a navigation is kept.
	pub fn report(&self, err: RouterError) {
		let mut slot = self.error.borrow_mut();
		if slot.is_some() {
			tracing::warn!(error = %err, "dropping follow-up navigation error");
			return;
		}
		*slot = Some(err);
	}

	/// Takes the recorded failure, if any.
	pub fn take_error(&self) -> Option<RouterError> {
		self.error.borrow_mut().take()
	}

	/// Counts one redirect towards `path`.
	pub(crate) fn enter_redirect(&self, path: &str) -> RouterResult<()> {
		let depth = self.redirect_depth.get() + 1;
		if depth > self.settings.max_redirect_depth {
			self.redirect_depth.set(0);
			tracing::warn!(%path, depth = self.settings.max_redirect_depth, "redirect loop");
			return Err(RouterError::RedirectLoop {
				path: path.to_string(),
				depth: self.settings.max_redirect_depth,
			});
		}
		self.redirect_depth.set(depth);
		Ok(())
	}

	pub(crate) fn reset_redirects(&self) {
		self.redirect_depth.set(0);
	}

	pub(crate) fn set_animated(&self, animated: Option<bool>) {
		self.animated.set(animated);
	}

	/// Takes the `animated` flag of the pending navigation.
	pub(crate) fn take_animated(&self) -> bool {
		self.animated.take().unwrap_or(self.settings.animated)
	}

	/// Drops the blocker and the last route. Used when the root disposes.
	pub(crate) fn clear(&self) {
		self.blocker.borrow_mut().take();
		self.last_route.borrow_mut().take();
		*self.active_router.borrow_mut() = Weak::new();
		self.store.borrow_mut().clear();
		self.pending.set(false);
	}
}
