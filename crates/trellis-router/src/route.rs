//! Route tree nodes.
//!
//! A [`Route`] is a structural node: pattern, match flags, view builder,
//! redirect, lifecycle hooks and children. The structure is shared and
//! immutable after construction apart from [`Route::append`]. Mutable
//! per-navigation data lives in [`RouteState`], which is private to each
//! node instance; the route store hands out one instance per concrete url.
//!
//! A [`Router`] is a route node carrying a router capability (history,
//! dispatch, home route), selected by [`NodeKind::Router`].

use crate::error::{RouterError, RouterResult};
use crate::matcher::{MatchOptions, PathMatch};
use crate::router::{Router, RouterCore};
use serde_json::Value;
use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use trellis_history::{Action, Location, Query};

/// Identity of a route declaration, shared by every store instance of it.
///
/// Derived from the address of the shared declaration, so it stays unique
/// for as long as any instance of the declaration is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(usize);

impl RouteId {
	fn of<V: 'static>(spec: &Rc<RouteSpec<V>>) -> Self {
		Self(Rc::as_ptr(spec).cast::<()>() as usize)
	}
}

/// Discriminates plain routes from routers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Route,
	Router,
}

/// Builds the view for a matched leaf route.
pub type BuildFn<V> = Rc<dyn Fn(&Router<V>, &Route<V>) -> Option<V>>;

/// Computes the optional routing state stored on a committed route.
pub type RoutingStateFn<V> = Rc<dyn Fn(&Router<V>, &Route<V>) -> Option<Value>>;

/// Lifecycle hook.
pub type RouteHook<V> = Rc<dyn Fn(&RouteEvent<'_, V>)>;

/// Arguments handed to lifecycle hooks.
pub struct RouteEvent<'a, V: 'static> {
	/// The router the hook fires for.
	pub router: &'a Router<V>,
	/// The route the hook fires for.
	pub route: &'a Route<V>,
	/// The location being rendered.
	pub location: &'a Location,
	/// How the location was reached.
	pub action: Action,
}

/// Redirect declared on a route. Resolved lazily at match time.
pub enum Redirect<V: 'static> {
	/// A fixed target path.
	To(String),
	/// A target computed from the router and route; `None` renders normally.
	With(Rc<dyn Fn(&Router<V>, &Route<V>) -> Option<String>>),
}

impl<V: 'static> Clone for Redirect<V> {
	fn clone(&self) -> Self {
		match self {
			Self::To(path) => Self::To(path.clone()),
			Self::With(resolve) => Self::With(Rc::clone(resolve)),
		}
	}
}

impl<V: 'static> std::fmt::Debug for Redirect<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::To(path) => f.debug_tuple("To").field(path).finish(),
			Self::With(_) => f.write_str("With(<fn>)"),
		}
	}
}

impl<V: 'static> Redirect<V> {
	/// Resolves the redirect target.
	pub fn resolve(&self, router: &Router<V>, route: &Route<V>) -> Option<String> {
		match self {
			Self::To(path) => Some(path.clone()),
			Self::With(resolve) => resolve(router, route),
		}
	}
}

pub(crate) struct RouteHooks<V: 'static> {
	pub(crate) will_enter: Option<RouteHook<V>>,
	pub(crate) did_enter: Option<RouteHook<V>>,
	pub(crate) did_exit: Option<RouteHook<V>>,
}

impl<V: 'static> Default for RouteHooks<V> {
	fn default() -> Self {
		Self {
			will_enter: None,
			did_enter: None,
			did_exit: None,
		}
	}
}

/// Mutable per-instance data, refreshed on every matched navigation.
pub struct RouteState<V: 'static> {
	pub matched: Option<PathMatch>,
	pub query: Query,
	pub raw_query: String,
	pub hash: String,
	pub route_data: Option<Value>,
	/// Cached result of the last view build.
	pub view: Option<Rc<V>>,
	pub routing_state: Option<Value>,
	pub action: Option<Action>,
	pub url: Option<String>,
	/// Url of the previously committed route.
	pub prev_url: Option<String>,
	pub active: bool,
}

impl<V: 'static> Default for RouteState<V> {
	fn default() -> Self {
		Self {
			matched: None,
			query: Query::new(),
			raw_query: String::new(),
			hash: String::new(),
			route_data: None,
			view: None,
			routing_state: None,
			action: None,
			url: None,
			prev_url: None,
			active: false,
		}
	}
}

impl<V: 'static> std::fmt::Debug for RouteState<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouteState")
			.field("matched", &self.matched)
			.field("query", &self.query)
			.field("hash", &self.hash)
			.field("route_data", &self.route_data)
			.field("has_view", &self.view.is_some())
			.field("routing_state", &self.routing_state)
			.field("action", &self.action)
			.field("url", &self.url)
			.field("prev_url", &self.prev_url)
			.field("active", &self.active)
			.finish()
	}
}

pub(crate) struct Resolved {
	pub(crate) pattern: Option<String>,
	pub(crate) child_base: Option<String>,
}

pub(crate) struct RouteSpec<V: 'static> {
	pub(crate) kind: NodeKind,
	pub(crate) pattern: Option<String>,
	pub(crate) resolved: OnceCell<Resolved>,
	pub(crate) options: MatchOptions,
	pub(crate) name: Option<String>,
	pub(crate) redirect: Option<Redirect<V>>,
	pub(crate) build: Option<BuildFn<V>>,
	pub(crate) routing_state: Option<RoutingStateFn<V>>,
	pub(crate) hooks: RouteHooks<V>,
	pub(crate) children: RefCell<Vec<Route<V>>>,
	pub(crate) owner: RefCell<Weak<RouteInner<V>>>,
}

pub(crate) struct RouteInner<V: 'static> {
	pub(crate) spec: Rc<RouteSpec<V>>,
	pub(crate) state: RefCell<RouteState<V>>,
	pub(crate) router: Option<Rc<RouterCore<V>>>,
}

/// A node of the route tree.
///
/// Cloning yields another handle to the same node instance.
pub struct Route<V: 'static> {
	pub(crate) inner: Rc<RouteInner<V>>,
}

impl<V: 'static> Clone for Route<V> {
	fn clone(&self) -> Self {
		Self {
			inner: Rc::clone(&self.inner),
		}
	}
}

impl<V: 'static> std::fmt::Debug for Route<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Route")
			.field("id", &self.id())
			.field("kind", &self.inner.spec.kind)
			.field("pattern", &self.inner.spec.pattern)
			.field("resolved", &self.resolved_pattern())
			.field("name", &self.inner.spec.name)
			.field("children", &self.inner.spec.children.borrow().len())
			.finish()
	}
}

impl<V: 'static> Route<V> {
	/// Creates a leaf route rendering `build`.
	pub fn new<F>(pattern: impl Into<String>, build: F) -> Self
	where
		F: Fn(&Router<V>, &Route<V>) -> Option<V> + 'static,
	{
		Self::builder(pattern).view(build).build()
	}

	/// Creates a route redirecting to `to`.
	pub fn redirect(pattern: impl Into<String>, to: impl Into<String>) -> Self {
		Self::builder(pattern).redirect_to(to).build()
	}

	/// Starts building a route.
	pub fn builder(pattern: impl Into<String>) -> RouteBuilder<V> {
		RouteBuilder::new(Some(pattern.into()))
	}

	/// Starts building a route without a pattern. It inherits its parent's match.
	pub fn pathless() -> RouteBuilder<V> {
		RouteBuilder::new(None)
	}

	pub fn id(&self) -> RouteId {
		RouteId::of(&self.inner.spec)
	}

	pub fn kind(&self) -> NodeKind {
		self.inner.spec.kind
	}

	pub fn is_router(&self) -> bool {
		self.inner.router.is_some()
	}

	/// Returns the router view of this node, if it is one.
	pub fn as_router(&self) -> Option<Router<V>> {
		self.inner
			.router
			.as_ref()
			.map(|core| Router::from_parts(self.clone(), Rc::clone(core)))
	}

	/// The pattern as declared.
	pub fn pattern(&self) -> Option<&str> {
		self.inner.spec.pattern.as_deref()
	}

	/// The absolute pattern once the tree has started, otherwise the
	/// declared one.
	pub fn resolved_pattern(&self) -> Option<&str> {
		match self.inner.spec.resolved.get() {
			Some(resolved) => resolved.pattern.as_deref(),
			None => self.inner.spec.pattern.as_deref(),
		}
	}

	pub fn options(&self) -> MatchOptions {
		self.inner.spec.options
	}

	pub fn name(&self) -> Option<&str> {
		self.inner.spec.name.as_deref()
	}

	pub fn redirect_target(&self) -> Option<&Redirect<V>> {
		self.inner.spec.redirect.as_ref()
	}

	pub fn has_build(&self) -> bool {
		self.inner.spec.build.is_some()
	}

	/// Borrows the mutable state of this instance.
	pub fn state(&self) -> Ref<'_, RouteState<V>> {
		self.inner.state.borrow()
	}

	pub(crate) fn state_mut(&self) -> RefMut<'_, RouteState<V>> {
		self.inner.state.borrow_mut()
	}

	/// The cached view, if this instance was rendered.
	pub fn view(&self) -> Option<Rc<V>> {
		self.inner.state.borrow().view.clone()
	}

	/// Parameters of the last match.
	pub fn params(&self) -> HashMap<String, String> {
		self.inner
			.state
			.borrow()
			.matched
			.as_ref()
			.map(|matched| matched.params.clone())
			.unwrap_or_default()
	}

	pub fn is_active(&self) -> bool {
		self.inner.state.borrow().active
	}

	/// Structural children.
	pub fn children(&self) -> Vec<Route<V>> {
		self.inner.spec.children.borrow().clone()
	}

	/// The router this node belongs to. Set when the tree starts.
	pub fn owner(&self) -> Option<Router<V>> {
		self.inner
			.spec
			.owner
			.borrow()
			.upgrade()
			.and_then(|inner| Route { inner }.as_router())
	}

	/// Whether both handles point to the same node instance.
	pub fn ptr_eq(&self, other: &Route<V>) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Whether both instances come from the same declaration.
	pub fn same_declaration(&self, other: &Route<V>) -> bool {
		self.id() == other.id()
	}

	/// Appends a child.
	///
	/// Appending to a started tree validates the child immediately.
	///
	/// # Errors
	///
	/// Appending a router to a started tree fails with
	/// [`RouterError::AlreadyInitialized`]; an invalid child fails like it
	/// would at start.
	pub fn append(&self, child: impl Into<Route<V>>) -> RouterResult<()> {
		let child = child.into();
		let owner = self.as_router().or_else(|| self.owner());
		let started = owner.and_then(|owner| owner.context().ok().map(|ctx| (owner, ctx)));

		if let (Some(resolved), Some((owner, ctx))) = (self.inner.spec.resolved.get(), started) {
			if child.is_router() {
				return Err(RouterError::AlreadyInitialized);
			}
			child.resolve_patterns(resolved.child_base.as_deref());
			owner.prepare(&ctx, &child)?;
		}
		self.inner.spec.children.borrow_mut().push(child);
		Ok(())
	}

	/// A readable label for logs and errors.
	pub fn label(&self) -> String {
		match (self.resolved_pattern(), self.name()) {
			(Some(pattern), _) => pattern.to_string(),
			(None, Some(name)) => name.to_string(),
			(None, None) => "<pathless>".to_string(),
		}
	}

	pub(crate) fn hooks(&self) -> &RouteHooks<V> {
		&self.inner.spec.hooks
	}

	pub(crate) fn build_fn(&self) -> Option<BuildFn<V>> {
		self.inner.spec.build.clone()
	}

	pub(crate) fn routing_state_fn(&self) -> Option<RoutingStateFn<V>> {
		self.inner.spec.routing_state.clone()
	}

	pub(crate) fn set_owner(&self, owner: &Router<V>) {
		*self.inner.spec.owner.borrow_mut() = Rc::downgrade(&owner.route().inner);
	}

	/// A new instance of the same declaration with fresh state.
	pub(crate) fn fork(&self) -> Route<V> {
		Route {
			inner: Rc::new(RouteInner {
				spec: Rc::clone(&self.inner.spec),
				state: RefCell::new(RouteState::default()),
				router: None,
			}),
		}
	}

	/// Resolves relative patterns against the nearest patterned ancestor.
	pub(crate) fn resolve_patterns(&self, base: Option<&str>) {
		let spec = &self.inner.spec;
		let resolved = spec.resolved.get_or_init(|| {
			let pattern = spec.pattern.as_deref().map(|pattern| join_pattern(base, pattern));
			let child_base = pattern.clone().or_else(|| base.map(str::to_string));
			Resolved {
				pattern,
				child_base,
			}
		});
		let child_base = resolved.child_base.clone();
		for child in self.children() {
			child.resolve_patterns(child_base.as_deref());
		}
	}
}

fn join_pattern(base: Option<&str>, pattern: &str) -> String {
	if pattern.starts_with('/') {
		return pattern.to_string();
	}
	let base = base.unwrap_or("").trim_end_matches('/');
	if pattern.is_empty() {
		return if base.is_empty() { "/".to_string() } else { base.to_string() };
	}
	format!("{}/{}", base, pattern)
}

/// Builder for [`Route`].
pub struct RouteBuilder<V: 'static> {
	pub(crate) pattern: Option<String>,
	pub(crate) options: MatchOptions,
	pub(crate) name: Option<String>,
	pub(crate) redirect: Option<Redirect<V>>,
	pub(crate) build: Option<BuildFn<V>>,
	pub(crate) routing_state: Option<RoutingStateFn<V>>,
	pub(crate) hooks: RouteHooks<V>,
	pub(crate) children: Vec<Route<V>>,
}

impl<V: 'static> RouteBuilder<V> {
	pub(crate) fn new(pattern: Option<String>) -> Self {
		Self {
			pattern,
			options: MatchOptions::default(),
			name: None,
			redirect: None,
			build: None,
			routing_state: None,
			hooks: RouteHooks::default(),
			children: Vec::new(),
		}
	}

	/// Require the whole url to match.
	pub fn exact(mut self, exact: bool) -> Self {
		self.options.exact = exact;
		self
	}

	/// Make a trailing slash significant.
	pub fn strict(mut self, strict: bool) -> Self {
		self.options.strict = strict;
		self
	}

	/// Match case-sensitively.
	pub fn sensitive(mut self, sensitive: bool) -> Self {
		self.options.sensitive = sensitive;
		self
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// Sets the view builder.
	pub fn view<F>(mut self, build: F) -> Self
	where
		F: Fn(&Router<V>, &Route<V>) -> Option<V> + 'static,
	{
		self.build = Some(Rc::new(build));
		self
	}

	/// Redirects to a fixed path.
	pub fn redirect_to(mut self, to: impl Into<String>) -> Self {
		self.redirect = Some(Redirect::To(to.into()));
		self
	}

	/// Redirects to a path computed at match time.
	pub fn redirect_with<F>(mut self, resolve: F) -> Self
	where
		F: Fn(&Router<V>, &Route<V>) -> Option<String> + 'static,
	{
		self.redirect = Some(Redirect::With(Rc::new(resolve)));
		self
	}

	pub fn routing_state<F>(mut self, compute: F) -> Self
	where
		F: Fn(&Router<V>, &Route<V>) -> Option<Value> + 'static,
	{
		self.routing_state = Some(Rc::new(compute));
		self
	}

	pub fn on_will_enter<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.hooks.will_enter = Some(Rc::new(hook));
		self
	}

	pub fn on_did_enter<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.hooks.did_enter = Some(Rc::new(hook));
		self
	}

	pub fn on_did_exit<F>(mut self, hook: F) -> Self
	where
		F: Fn(&RouteEvent<'_, V>) + 'static,
	{
		self.hooks.did_exit = Some(Rc::new(hook));
		self
	}

	/// Adds a child route or router.
	pub fn child(mut self, child: impl Into<Route<V>>) -> Self {
		self.children.push(child.into());
		self
	}

	/// Adds several children, in priority order.
	pub fn children<I, R>(mut self, children: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: Into<Route<V>>,
	{
		self.children.extend(children.into_iter().map(Into::into));
		self
	}

	/// Finishes the route.
	pub fn build(self) -> Route<V> {
		self.into_node(NodeKind::Route, None)
	}

	pub(crate) fn into_node(self, kind: NodeKind, router: Option<Rc<RouterCore<V>>>) -> Route<V> {
		Route {
			inner: Rc::new(RouteInner {
				spec: Rc::new(RouteSpec {
					kind,
					pattern: self.pattern,
					resolved: OnceCell::new(),
					options: self.options,
					name: self.name,
					redirect: self.redirect,
					build: self.build,
					routing_state: self.routing_state,
					hooks: self.hooks,
					children: RefCell::new(self.children),
					owner: RefCell::new(Weak::new()),
				}),
				state: RefCell::new(RouteState::default()),
				router,
			}),
		}
	}
}
