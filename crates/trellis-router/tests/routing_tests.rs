//! Integration tests for matching, rendering and nested routers.

use proptest::prelude::*;
use rstest::{fixture, rstest};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use trellis_history::HistoryError;
use trellis_router::{Action, NavigationSettings, Route, Router, RouterError};

fn view(name: &'static str) -> Route<String> {
	Route::new(name, move |_, route| {
		Some(format!("{}@{}", name, route.state().url.clone().unwrap_or_default()))
	})
}

fn current_view(router: &Router<String>) -> Option<String> {
	router
		.context()
		.ok()
		.and_then(|ctx| ctx.last_route())
		.and_then(|route| route.view())
		.map(|view| view.as_ref().clone())
}

fn urls(router: &Router<String>) -> Vec<String> {
	router
		.history_as_array()
		.unwrap()
		.into_iter()
		.map(|location| location.url)
		.collect()
}

/// Root "/" with home "/home", a nested "/inbox" router and a settings leaf.
struct Tree {
	root: Router<String>,
	inbox: Router<String>,
}

#[fixture]
fn tree() -> Tree {
	let inbox = Router::builder("/inbox")
		.home(view("all"))
		.route(view(":id"))
		.build();
	let root = Router::builder("/")
		.home(view("/home"))
		.route(inbox.clone())
		.route(view("/settings"))
		.build();
	root.start(NavigationSettings::default()).unwrap();
	Tree { root, inbox }
}

// ============================================================================
// Start and home routes
// ============================================================================

#[rstest]
fn test_start_renders_root_home(tree: Tree) {
	assert_eq!(urls(&tree.root), vec!["/home"]);
	assert_eq!(current_view(&tree.root).as_deref(), Some("/home@/home"));
	assert!(tree.root.is_active());
}

#[rstest]
fn test_start_seeds_nested_home_silently(tree: Tree) {
	assert_eq!(urls(&tree.inbox), vec!["/inbox/all"]);
	// Seeding does not render; the root home is the committed route.
	assert_eq!(
		tree.root.context().unwrap().last_route().and_then(|r| r.state().url.clone()),
		Some("/home".to_string())
	);
}

#[rstest]
fn test_start_twice_fails(tree: Tree) {
	assert_eq!(
		tree.root.start(NavigationSettings::default()),
		Err(RouterError::AlreadyInitialized)
	);
}

#[rstest]
fn test_missing_build_fails_start() {
	let root: Router<String> = Router::builder("/")
		.route(Route::builder("/empty").build())
		.build();

	assert_eq!(
		root.start(NavigationSettings::default()),
		Err(RouterError::MissingBuild("/empty".to_string()))
	);
}

#[rstest]
#[case("/users/:id")]
#[case("/files/*")]
fn test_parameterized_home_is_rejected(#[case] pattern: &'static str) {
	let root: Router<String> = Router::builder("/").home(view(pattern)).build();

	assert_eq!(
		root.start(NavigationSettings::default()),
		Err(RouterError::InvalidHome(pattern.to_string()))
	);
}

#[rstest]
fn test_malformed_url_fails_push(tree: Tree) {
	let err = tree.root.push("/a%zz", None, None).unwrap_err();

	assert!(matches!(err, RouterError::History(HistoryError::MalformedUrl { .. })));
	assert_eq!(urls(&tree.root), vec!["/home"]);
	assert_eq!(current_view(&tree.root).as_deref(), Some("/home@/home"));
}

#[rstest]
fn test_invalid_pattern_fails_start() {
	let root: Router<String> = Router::builder("/").route(view("/a/:id([")).build();

	let result = root.start(NavigationSettings::default());

	assert!(matches!(result, Err(RouterError::InvalidPattern { .. })));
}

#[rstest]
fn test_navigation_before_start_fails() {
	let root: Router<String> = Router::builder("/").route(view("/a")).build();
	assert_eq!(root.push("/a", None, None), Err(RouterError::NotInitialized));
}

// ============================================================================
// Matching
// ============================================================================

#[rstest]
fn test_first_declared_match_wins() {
	// Arrange
	let root = Router::builder("/")
		.route(view("/users/new"))
		.route(view("/users/:id"))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/users/new", None, None).unwrap();
	let first = current_view(&root);
	root.push("/users/5", None, None).unwrap();
	let second = current_view(&root);

	// Assert
	assert_eq!(first.as_deref(), Some("/users/new@/users/new"));
	assert_eq!(second.as_deref(), Some("/users/:id@/users/5"));
}

#[rstest]
fn test_earlier_sibling_shadows_later_ones() {
	// Arrange
	let root = Router::builder("/")
		.route(
			Route::builder("/path/to")
				.children([view(":name"), view(":id"), view("*")])
				.build(),
		)
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/path/to/1", None, None).unwrap();

	// Assert
	let leaf = root.context().unwrap().last_route().unwrap();
	assert_eq!(
		leaf.params(),
		HashMap::from([("name".to_string(), "1".to_string())])
	);
	assert_eq!(current_view(&root).as_deref(), Some(":name@/path/to/1"));
}

#[rstest]
fn test_params_query_and_route_data_reach_the_leaf(tree: Tree) {
	// Act
	tree.root
		.push("/inbox/42?tab=unread#top", Some(json!({ "from": "list" })), None)
		.unwrap();

	// Assert
	let leaf = tree.root.context().unwrap().last_route().unwrap();
	let state = leaf.state();
	assert_eq!(leaf.params().get("id").map(String::as_str), Some("42"));
	assert_eq!(state.query.get("tab").map(String::as_str), Some("unread"));
	assert_eq!(state.raw_query, "tab=unread");
	assert_eq!(state.hash, "top");
	assert_eq!(state.route_data, Some(json!({ "from": "list" })));
	assert_eq!(state.action, Some(Action::Push));
	assert_eq!(state.prev_url.as_deref(), Some("/home"));
}

#[rstest]
fn test_unmatched_url_is_not_found(tree: Tree) {
	assert_eq!(
		tree.root.push("/nowhere", None, None),
		Err(RouterError::NotFound("/nowhere".to_string()))
	);
}

#[rstest]
fn test_pathless_layout_inherits_parent_match() {
	// Arrange
	let root = Router::builder("/")
		.route(
			Route::builder("/account")
				.child(Route::pathless().name("layout").child(view("profile")).build())
				.build(),
		)
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/account/profile", None, None).unwrap();

	// Assert
	let branch = root.last_branch();
	let labels: Vec<String> = branch.iter().map(|entry| entry.route.label()).collect();
	assert_eq!(labels, vec!["/", "/account", "layout", "/account/profile"]);
	assert_eq!(branch[2].matched.url, "/account");
}

#[rstest]
fn test_routing_state_is_stored_on_commit() {
	let root = Router::builder("/")
		.route(
			Route::builder("/orders/:id")
				.view(|_, _| Some("order".to_string()))
				.routing_state(|_, route| Some(json!({ "order": route.params()["id"] })))
				.build(),
		)
		.build();
	root.start(NavigationSettings::default()).unwrap();

	root.push("/orders/9", None, None).unwrap();

	let leaf = root.context().unwrap().last_route().unwrap();
	assert_eq!(leaf.state().routing_state, Some(json!({ "order": "9" })));
}

#[rstest]
fn test_build_returning_none_is_empty_view() {
	let root: Router<String> = Router::builder("/")
		.route(Route::new("/blank", |_, _| None))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	assert_eq!(
		root.push("/blank", None, None),
		Err(RouterError::EmptyView("/blank".to_string()))
	);
}

proptest! {
	/// Dispatching the same url twice resolves to the same route instance.
	#[test]
	fn prop_dispatch_is_idempotent(id in 0u32..10_000) {
		let root = Router::builder("/")
			.route(view("/users/:id"))
			.build();
		root.start(NavigationSettings::default()).unwrap();
		let url = format!("/users/{}", id);

		root.push(&url, None, None).unwrap();
		let first = root.context().unwrap().last_route().unwrap();
		root.push(&url, None, None).unwrap();
		let second = root.context().unwrap().last_route().unwrap();

		prop_assert!(first.ptr_eq(&second));
		prop_assert_eq!(second.params().get("id").cloned(), Some(id.to_string()));
		prop_assert_eq!(root.context().unwrap().stored_routes(), 1);
	}
}

// ============================================================================
// Redirects
// ============================================================================

#[rstest]
fn test_redirect_replaces_the_pushed_entry() {
	// Arrange
	let root = Router::builder("/")
		.home(view("/home"))
		.route(Route::redirect("/old", "/new"))
		.route(view("/new"))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/old", None, None).unwrap();

	// Assert
	assert_eq!(urls(&root), vec!["/home", "/new"]);
	assert_eq!(current_view(&root).as_deref(), Some("/new@/new"));
}

#[rstest]
fn test_redirect_chain_builds_target_once() {
	// Arrange
	let builds = Rc::new(Cell::new(0));
	let counter = Rc::clone(&builds);
	let root = Router::builder("/")
		.route(Route::redirect("/a", "/b"))
		.route(Route::redirect("/b", "/x/1"))
		.route(Route::new("/x/:id", move |_, _| {
			counter.set(counter.get() + 1);
			Some("x".to_string())
		}))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/a", None, None).unwrap();

	// Assert
	assert_eq!(urls(&root), vec!["/x/1"]);
	assert_eq!(builds.get(), 1);
}

#[rstest]
fn test_redirect_during_replace_overwrites_entry() {
	let root = Router::builder("/")
		.home(view("/home"))
		.route(Route::redirect("/old", "/new"))
		.route(view("/new"))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	root.replace("/old", None, None).unwrap();

	assert_eq!(urls(&root), vec!["/new"]);
	let leaf = root.context().unwrap().last_route().unwrap();
	assert_eq!(leaf.state().action, Some(Action::Replace));
}

#[rstest]
fn test_computed_redirect_can_decline() {
	let allowed = Rc::new(Cell::new(false));
	let gate = Rc::clone(&allowed);
	let root = Router::builder("/")
		.route(
			Route::builder("/admin")
				.view(|_, _| Some("admin".to_string()))
				.redirect_with(move |_, _| (!gate.get()).then(|| "/login".to_string()))
				.build(),
		)
		.route(view("/login"))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	root.push("/admin", None, None).unwrap();
	assert_eq!(current_view(&root).as_deref(), Some("/login@/login"));

	allowed.set(true);
	root.push("/admin", None, None).unwrap();
	assert_eq!(current_view(&root).as_deref(), Some("admin"));
}

#[rstest]
fn test_redirect_loop_is_bounded() {
	// Arrange
	let root = Router::builder("/")
		.home(view("/home"))
		.route(Route::redirect("/a", "/b"))
		.route(Route::redirect("/b", "/a"))
		.build();
	root.start(NavigationSettings::default().with_max_redirect_depth(4))
		.unwrap();

	// Act
	let result = root.push("/a", None, None);

	// Assert
	assert!(matches!(result, Err(RouterError::RedirectLoop { depth: 4, .. })));
	assert_eq!(urls(&root), vec!["/home"]);
	assert_eq!(current_view(&root).as_deref(), Some("/home@/home"));
}

#[rstest]
fn test_exact_router_match_enters_home(tree: Tree) {
	tree.root.push("/inbox", None, None).unwrap();

	assert_eq!(current_view(&tree.root).as_deref(), Some("all@/inbox/all"));
}

#[rstest]
fn test_listeners_only_see_redirect_target() {
	// Arrange
	let root = Router::builder("/")
		.home(view("/home"))
		.route(Route::redirect("/old", "/new"))
		.route(view("/new"))
		.build();
	root.start(NavigationSettings::default()).unwrap();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen);
	root.listen(move |location, action| {
		sink.borrow_mut().push((location.url.clone(), action));
	})
	.unwrap();

	// Act
	root.push("/old", None, None).unwrap();

	// Assert
	assert_eq!(urls(&root), vec!["/home", "/new"]);
	assert_eq!(*seen.borrow(), vec![("/new".to_string(), Action::Push)]);
	assert_eq!(current_view(&root).as_deref(), Some("/new@/new"));
}

#[rstest]
fn test_relative_redirect_resolves_against_rendered_location() {
	// Arrange
	let root = Router::builder("/")
		.home(view("/home"))
		.route(Route::redirect("/users/old", "new"))
		.route(view("/users/new"))
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/users/old", None, None).unwrap();

	// Assert
	assert_eq!(urls(&root), vec!["/home", "/users/new"]);
	assert_eq!(current_view(&root).as_deref(), Some("/users/new@/users/new"));
}

// ============================================================================
// Back navigation and cached views
// ============================================================================

#[rstest]
fn test_back_navigation_reuses_cached_view() {
	// Arrange
	let builds = Rc::new(Cell::new(0));
	let counter = Rc::clone(&builds);
	let root = Router::builder("/")
		.route(Route::new("/users/:id", move |_, route| {
			counter.set(counter.get() + 1);
			Some(format!("user {}", route.params()["id"]))
		}))
		.build();
	root.start(NavigationSettings::default()).unwrap();
	root.push("/users/1", None, None).unwrap();
	root.push("/users/2", None, None).unwrap();

	// Act
	root.go_back(None, None).unwrap();

	// Assert
	assert_eq!(builds.get(), 2);
	assert_eq!(current_view(&root).as_deref(), Some("user 1"));
	let leaf = root.context().unwrap().last_route().unwrap();
	assert_eq!(leaf.state().action, Some(Action::Pop));
}

#[rstest]
fn test_go_back_to_url_finds_latest_entry() {
	let root = Router::builder("/")
		.route(view("/a"))
		.route(view("/b"))
		.route(view("/c"))
		.build();
	root.start(NavigationSettings::default()).unwrap();
	for url in ["/a", "/b", "/a", "/c"] {
		root.push(url, None, None).unwrap();
	}

	root.go_back_to_url("/a").unwrap();

	let history = root.controller().unwrap().history().unwrap();
	assert_eq!(history.index(), Some(2));
	assert_eq!(current_view(&root).as_deref(), Some("/a@/a"));
}

#[rstest]
fn test_go_back_with_url_delegates() {
	let root = Router::builder("/").route(view("/a")).route(view("/b")).build();
	root.start(NavigationSettings::default()).unwrap();
	root.push("/a", None, None).unwrap();
	root.push("/b", None, None).unwrap();

	assert_eq!(
		root.go_back(Some("/missing"), None),
		Err(RouterError::NotInHistory("/missing".to_string()))
	);
	root.go_back(Some("/a"), None).unwrap();
	assert_eq!(current_view(&root).as_deref(), Some("/a@/a"));
}

#[rstest]
fn test_go_back_to_counts_entries() {
	let root = Router::builder("/")
		.route(view("/a"))
		.route(view("/b"))
		.route(view("/c"))
		.build();
	root.start(NavigationSettings::default()).unwrap();
	for url in ["/a", "/b", "/c"] {
		root.push(url, None, None).unwrap();
	}

	root.go_back_to(2).unwrap();

	assert_eq!(current_view(&root).as_deref(), Some("/a@/a"));
	assert_eq!(urls(&root).len(), 3);
}

// ============================================================================
// Nested routers
// ============================================================================

#[rstest]
fn test_push_through_root_syncs_nested_history(tree: Tree) {
	// Act
	tree.root.push("/inbox/3", None, None).unwrap();

	// Assert
	assert_eq!(urls(&tree.root), vec!["/home", "/inbox/3"]);
	assert_eq!(urls(&tree.inbox), vec!["/inbox/all", "/inbox/3"]);
	assert!(tree.inbox.is_active());
	assert!(!tree.root.is_active());
}

#[rstest]
fn test_nested_push_leaves_parent_history_alone(tree: Tree) {
	// Act
	tree.inbox.push("/inbox/4", None, None).unwrap();

	// Assert
	assert_eq!(urls(&tree.root), vec!["/home"]);
	assert_eq!(urls(&tree.inbox), vec!["/inbox/all", "/inbox/4"]);
	assert_eq!(current_view(&tree.root).as_deref(), Some(":id@/inbox/4"));
}

#[rstest]
fn test_unowned_nested_push_bubbles_to_root(tree: Tree) {
	tree.inbox.push("/settings", None, None).unwrap();

	assert_eq!(urls(&tree.root), vec!["/home", "/settings"]);
	assert_eq!(urls(&tree.inbox), vec!["/inbox/all"]);
	assert_eq!(current_view(&tree.root).as_deref(), Some("/settings@/settings"));
}

#[rstest]
fn test_sibling_routers_keep_independent_histories() {
	// Arrange
	let mail = Router::builder("/mail").route(view(":id")).build();
	let chat = Router::builder("/chat").route(view(":id")).build();
	let root = Router::builder("/")
		.route(mail.clone())
		.route(chat.clone())
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	mail.push("/mail/1", None, None).unwrap();
	mail.push("/mail/2", None, None).unwrap();
	chat.push("/chat/9", None, None).unwrap();

	// Assert
	let mail_urls: Vec<String> = mail
		.history_as_array()
		.unwrap()
		.into_iter()
		.map(|l| l.url)
		.collect();
	assert_eq!(mail_urls, vec!["/mail/1", "/mail/2"]);
	assert_eq!(chat.history_as_array().unwrap().len(), 1);

	mail.go_back(None, None).unwrap();
	assert_eq!(
		mail.location().unwrap().map(|l| l.url),
		Some("/mail/1".to_string())
	);
	assert_eq!(
		chat.location().unwrap().map(|l| l.url),
		Some("/chat/9".to_string())
	);
	assert_eq!(current_view(&root).as_deref(), Some(":id@/mail/1"));
}

#[rstest]
fn test_nested_go_back_falls_back_to_parent(tree: Tree) {
	// Arrange
	tree.root.push("/inbox/3", None, None).unwrap();
	tree.inbox.go_back(None, None).unwrap();
	assert_eq!(current_view(&tree.root).as_deref(), Some("all@/inbox/all"));

	// Act
	tree.inbox.go_back(None, None).unwrap();

	// Assert
	assert_eq!(current_view(&tree.root).as_deref(), Some("/home@/home"));
	assert_eq!(tree.root.controller().unwrap().history().unwrap().index(), Some(0));
}

#[rstest]
fn test_root_pop_moves_nested_index(tree: Tree) {
	tree.root.push("/inbox/3", None, None).unwrap();
	tree.root.push("/inbox/5", None, None).unwrap();

	tree.root.go_back(None, None).unwrap();

	let inbox = tree.inbox.controller().unwrap().history().unwrap();
	assert_eq!(inbox.location().map(|l| l.url), Some("/inbox/3".to_string()));
	assert_eq!(inbox.len(), 3);
}

#[rstest]
fn test_append_after_start_validates_child(tree: Tree) {
	tree.root.append(view("/late")).unwrap();
	tree.root.push("/late", None, None).unwrap();
	assert_eq!(current_view(&tree.root).as_deref(), Some("/late@/late"));

	assert_eq!(
		tree.root.append(Route::builder("/hollow").build()),
		Err(RouterError::MissingBuild("/hollow".to_string()))
	);
	assert_eq!(
		tree.root.append(Router::builder("/nested").route(view("x")).build()),
		Err(RouterError::AlreadyInitialized)
	);
}

// ============================================================================
// Lifecycle hooks
// ============================================================================

#[rstest]
fn test_will_enter_runs_from_leaf_to_root() {
	// Arrange
	let log = Rc::new(RefCell::new(Vec::new()));
	let hook = |name: &'static str| {
		let log = Rc::clone(&log);
		move |_: &trellis_router::RouteEvent<'_, String>| log.borrow_mut().push(name)
	};
	let section = Router::builder("/a")
		.on_will_enter(hook("section"))
		.route(
			Route::pathless()
				.on_will_enter(hook("layout"))
				.child(
					Route::builder("b")
						.view(|_, _| Some("b".to_string()))
						.on_will_enter(hook("leaf"))
						.build(),
				)
				.build(),
		)
		.build();
	let root = Router::builder("/")
		.on_will_enter(hook("root"))
		.route(section)
		.build();
	root.start(NavigationSettings::default()).unwrap();

	// Act
	root.push("/a/b", None, None).unwrap();

	// Assert
	assert_eq!(*log.borrow(), vec!["leaf", "layout", "section", "root"]);
}

#[rstest]
fn test_enter_and_exit_hooks_fire_around_transition() {
	// Arrange
	let log = Rc::new(RefCell::new(Vec::new()));
	let (exit_log, enter_log, match_log) = (Rc::clone(&log), Rc::clone(&log), Rc::clone(&log));
	let root = Router::builder("/")
		.on_did_match(move |event| match_log.borrow_mut().push(format!("match {}", event.location.url)))
		.route(
			Route::builder("/one")
				.view(|_, _| Some("one".to_string()))
				.on_did_exit(move |event| exit_log.borrow_mut().push(format!("exit one for {}", event.location.url)))
				.build(),
		)
		.route(
			Route::builder("/two")
				.view(|_, _| Some("two".to_string()))
				.on_did_enter(move |event| enter_log.borrow_mut().push(format!("enter {}", event.route.label())))
				.build(),
		)
		.build();
	root.start(NavigationSettings::default()).unwrap();
	root.push("/one", None, None).unwrap();
	log.borrow_mut().clear();

	// Act
	root.push("/two", None, None).unwrap();

	// Assert
	assert_eq!(
		*log.borrow(),
		vec!["exit one for /two", "match /two", "enter /two"]
	);
	let branch = root.last_branch();
	assert!(branch.last().is_some_and(|entry| entry.route.is_active()));
}

// ============================================================================
// Dispose
// ============================================================================

#[rstest]
fn test_dispose_cascades_to_nested_routers(tree: Tree) {
	// Act
	tree.root.dispose();

	// Assert
	assert!(tree.root.is_disposed());
	assert!(tree.inbox.is_disposed());
	let err = tree.inbox.push("/inbox/1", None, None).unwrap_err();
	assert!(err.is_disposed());
	assert!(tree.root.history_as_array().unwrap_err().is_disposed());
}

#[rstest]
fn test_disposed_root_rejects_navigation_and_stays_silent(tree: Tree) {
	// Arrange
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen);
	tree.root
		.listen(move |location, _| sink.borrow_mut().push(location.url.clone()))
		.unwrap();
	let history = tree.root.controller().unwrap().history().unwrap();

	// Act
	tree.root.dispose();

	// Assert
	assert!(tree.root.push("/settings", None, None).unwrap_err().is_disposed());
	assert!(tree.root.go_back(None, None).unwrap_err().is_disposed());
	assert!(tree.root.go_back_to(1).unwrap_err().is_disposed());
	history.push("/settings", None).unwrap();
	assert!(seen.borrow().is_empty());
	assert_eq!(history.listener_count(), 0);
}

#[rstest]
fn test_disposing_nested_router_keeps_root_alive(tree: Tree) {
	tree.inbox.dispose();

	assert!(tree.inbox.is_disposed());
	tree.root.push("/settings", None, None).unwrap();
	assert_eq!(current_view(&tree.root).as_deref(), Some("/settings@/settings"));
}
