//! Per-url route instances.
//!
//! Matching a plain route interns it here: the first match of a declaration
//! at a concrete url forks a fresh instance, later matches at that url reuse
//! it. `/users/1` and `/users/2` therefore keep separate [`RouteState`]s,
//! while returning to `/users/1` finds its cached view again. Routers are
//! structural and never interned.
//!
//! [`RouteState`]: crate::route::RouteState

use crate::route::{Route, RouteId};
use std::collections::HashMap;

pub struct RouteStore<V: 'static> {
	routes: HashMap<(RouteId, String), Route<V>>,
}

impl<V: 'static> Default for RouteStore<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: 'static> std::fmt::Debug for RouteStore<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RouteStore")
			.field("len", &self.routes.len())
			.finish()
	}
}

impl<V: 'static> RouteStore<V> {
	pub fn new() -> Self {
		Self {
			routes: HashMap::new(),
		}
	}

	/// Returns the instance of `route` for `url`, forking one on first use.
	pub fn intern(&mut self, route: &Route<V>, url: &str) -> Route<V> {
		self.routes
			.entry((route.id(), url.to_string()))
			.or_insert_with(|| {
				tracing::trace!(%url, pattern = ?route.resolved_pattern(), "interning route");
				route.fork()
			})
			.clone()
	}

	pub fn get(&self, route: &Route<V>, url: &str) -> Option<Route<V>> {
		self.routes.get(&(route.id(), url.to_string())).cloned()
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}

	pub fn clear(&mut self) {
		self.routes.clear();
	}
}
