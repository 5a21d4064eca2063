//! # History Controller Tests
//!
//! Integration tests for nested history controllers.
//!
//! ## Test Coverage
//! - Local push and go_back notifications
//! - Bubbling of unowned pushes and exhausted go_back to the parent
//! - Ancestor observation of descendant pushes
//! - Cascading dispose

use rstest::*;
use std::cell::RefCell;
use std::rc::Rc;
use trellis_history::{Action, AnyPath, HistoryController, HistoryError};

fn under(base: &'static str) -> impl Fn(&str) -> bool {
	move |url: &str| url == base || url.starts_with(&format!("{}/", base))
}

fn record(controller: &HistoryController) -> Rc<RefCell<Vec<String>>> {
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen);
	controller
		.listen(move |location, _| sink.borrow_mut().push(location.url.clone()))
		.unwrap();
	seen
}

#[fixture]
fn tree() -> (HistoryController, HistoryController) {
	let root = HistoryController::new(AnyPath);
	root.push("/", None).unwrap();
	let node = root.create_node(under("/path")).unwrap();
	(root, node)
}

// ============================================================================
// Local navigation
// ============================================================================

#[rstest]
fn test_push_then_go_back_notifies_in_order(tree: (HistoryController, HistoryController)) {
	// Arrange
	let (_root, node) = tree;
	let node_seen = record(&node);

	// Act
	node.push("/path", None).unwrap();
	node.push("/path/2", None).unwrap();
	node.go_back().unwrap();

	// Assert
	assert_eq!(*node_seen.borrow(), vec!["/path", "/path/2", "/path"]);
}

#[rstest]
fn test_go_back_on_exhausted_node_delegates_to_parent(
	tree: (HistoryController, HistoryController),
) {
	// Arrange
	let (root, node) = tree;
	root.push("/elsewhere", None).unwrap();
	let root_seen = record(&root);
	node.push("/path", None).unwrap();

	// Act
	node.go_back().unwrap();

	// Assert
	assert_eq!(*root_seen.borrow(), vec!["/"]);
	assert_eq!(root.location().unwrap().map(|l| l.url), Some("/".to_string()));
	assert_eq!(node.location().unwrap().map(|l| l.url), Some("/path".to_string()));
}

#[rstest]
fn test_go_back_action_is_pop(tree: (HistoryController, HistoryController)) {
	let (_root, node) = tree;
	let actions = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&actions);
	node.listen(move |_, action| sink.borrow_mut().push(action))
		.unwrap();

	node.push("/path/a", None).unwrap();
	node.push("/path/b", None).unwrap();
	node.go_back().unwrap();

	assert_eq!(*actions.borrow(), vec![Action::Push, Action::Push, Action::Pop]);
}

// ============================================================================
// Bubbling
// ============================================================================

#[rstest]
#[case("/path", true)]
#[case("/path1", false)]
#[case("/path/subpath", true)]
#[case("/path?x=1", true)]
fn test_can_push(tree: (HistoryController, HistoryController), #[case] url: &str, #[case] expected: bool) {
	let (_root, node) = tree;
	assert_eq!(node.can_push(url), expected);
}

#[rstest]
fn test_unowned_push_bubbles_to_parent(tree: (HistoryController, HistoryController)) {
	// Arrange
	let (root, node) = tree;

	// Act
	node.push("/other", None).unwrap();

	// Assert
	assert!(node.entries().unwrap().is_empty());
	let urls: Vec<String> = root.entries().unwrap().into_iter().map(|l| l.url).collect();
	assert_eq!(urls, vec!["/", "/other"]);
}

#[rstest]
fn test_ancestor_observes_descendant_pushes_once_in_order() {
	// Arrange
	let root = HistoryController::new(AnyPath);
	let middle = root.create_node(under("/a")).unwrap();
	let leaf = middle.create_node(under("/a/b")).unwrap();
	let root_seen = record(&root);
	let middle_seen = record(&middle);

	// Act
	leaf.push("/x", None).unwrap();
	leaf.push("/a/1", None).unwrap();
	leaf.push("/y", None).unwrap();
	leaf.push("/a/b/c", None).unwrap();

	// Assert
	assert_eq!(*root_seen.borrow(), vec!["/x", "/y"]);
	assert_eq!(*middle_seen.borrow(), vec!["/a/1"]);
	assert_eq!(leaf.entries().unwrap().len(), 1);
}

#[rstest]
fn test_prevent_default_suppresses_bubble(tree: (HistoryController, HistoryController)) {
	let (root, node) = tree;

	node.prevent_default();
	node.push("/other", None).unwrap();
	node.push("/other", None).unwrap();

	assert_eq!(root.entries().unwrap().len(), 2);
}

#[rstest]
fn test_replace_bubbles_like_push(tree: (HistoryController, HistoryController)) {
	let (root, node) = tree;

	node.replace("/swapped", None).unwrap();

	let urls: Vec<String> = root.entries().unwrap().into_iter().map(|l| l.url).collect();
	assert_eq!(urls, vec!["/swapped"]);
}

// ============================================================================
// Re-entrant listeners
// ============================================================================

#[rstest]
fn test_listener_navigating_stops_stale_fan_out() {
	// Arrange
	let root = HistoryController::new(AnyPath);
	let first = root.clone();
	root.listen(move |location, action| {
		if location.url == "/old" && action == Action::Push {
			first.rollback().unwrap();
			first.push("/new", None).unwrap();
		}
	})
	.unwrap();
	let seen = record(&root);

	// Act
	root.push("/old", None).unwrap();

	// Assert
	let urls: Vec<String> = root.entries().unwrap().into_iter().map(|l| l.url).collect();
	assert_eq!(urls, vec!["/new"]);
	assert_eq!(*seen.borrow(), vec!["/new".to_string()]);
}

// ============================================================================
// Dispose
// ============================================================================

#[rstest]
fn test_dispose_cascades_and_fails_loudly(tree: (HistoryController, HistoryController)) {
	// Arrange
	let (root, node) = tree;
	let node_seen = record(&node);
	let history = node.history().unwrap();

	// Act
	root.dispose();

	// Assert
	assert!(root.is_disposed());
	assert!(node.is_disposed());
	assert_eq!(node.push("/path", None), Err(HistoryError::Disposed));
	assert_eq!(node.go_back(), Err(HistoryError::Disposed));
	assert_eq!(root.push("/", None), Err(HistoryError::Disposed));
	history.push("/path/late", None).unwrap();
	assert!(node_seen.borrow().is_empty());
	assert_eq!(history.listener_count(), 0);
}

#[rstest]
fn test_listen_after_dispose_fails(tree: (HistoryController, HistoryController)) {
	let (_root, node) = tree;
	node.dispose();
	assert!(matches!(node.listen(|_, _| {}), Err(HistoryError::Disposed)));
	assert!(matches!(node.create_node(AnyPath), Err(HistoryError::Disposed)));
}
