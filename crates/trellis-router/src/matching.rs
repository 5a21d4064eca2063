//! Tree matching.
//!
//! [`match_routes`] walks the tree depth-first. At each level the first
//! sibling whose pattern matches wins and the walk descends into its
//! children; later siblings are never evaluated. A node without a pattern
//! inherits the match of its parent (or the root match at the top).

use crate::context::NavigationContext;
use crate::error::RouterResult;
use crate::matcher::PathMatch;
use crate::route::Route;

/// One element of a matched branch.
pub struct MatchedRoute<V: 'static> {
	/// The matched node. Plain routes are store instances, routers are the
	/// structural node.
	pub route: Route<V>,
	pub matched: PathMatch,
}

impl<V: 'static> Clone for MatchedRoute<V> {
	fn clone(&self) -> Self {
		Self {
			route: self.route.clone(),
			matched: self.matched.clone(),
		}
	}
}

impl<V: 'static> std::fmt::Debug for MatchedRoute<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MatchedRoute")
			.field("route", &self.route.label())
			.field("matched", &self.matched)
			.finish()
	}
}

/// Returns the root-to-leaf branch matching `pathname`, or an empty branch
/// when not even a top-level node matches.
pub fn match_routes<V: 'static>(
	ctx: &NavigationContext<V>,
	routes: &[Route<V>],
	pathname: &str,
) -> RouterResult<Vec<MatchedRoute<V>>> {
	let mut branch = Vec::new();
	collect(ctx, routes, pathname, &mut branch)?;
	Ok(branch)
}

fn collect<V: 'static>(
	ctx: &NavigationContext<V>,
	routes: &[Route<V>],
	pathname: &str,
	branch: &mut Vec<MatchedRoute<V>>,
) -> RouterResult<()> {
	for route in routes {
		let matched = match route.resolved_pattern() {
			None => branch
				.last()
				.map(|parent| parent.matched.clone())
				.unwrap_or_else(|| PathMatch::root(pathname)),
			Some(pattern) => match ctx.match_path(pathname, pattern, route.options())? {
				Some(matched) => matched,
				None => continue,
			},
		};

		let node = if route.is_router() {
			route.clone()
		} else {
			ctx.intern(route, &matched.url)
		};
		branch.push(MatchedRoute {
			route: node,
			matched,
		});
		collect(ctx, &route.children(), pathname, branch)?;
		break;
	}
	Ok(())
}
