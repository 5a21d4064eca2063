//! Nested history controllers.
//!
//! Every navigational node owns one [`HistoryController`], which wraps a
//! [`MemoryHistory`] scoped to the node's path namespace. Controllers form a
//! tree mirroring the node tree:
//!
//! ```text
//! root controller ("/")
//!     ├── node ("/inbox")
//!     │     └── node ("/inbox/:id")
//!     └── node ("/settings")
//! ```
//!
//! A push the node cannot own bubbles to its parent, and so does a `go_back`
//! on a node whose local history has nothing to step back to.

use crate::error::{HistoryError, HistoryResult};
use crate::location::{Location, strip_search};
use crate::memory::{Action, ListenerId, MemoryHistory, PromptResult, PromptToken};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Decides which urls a controller owns.
pub trait PathScope {
	/// Returns `true` if `pathname` belongs to this scope.
	fn contains(&self, pathname: &str) -> bool;
}

impl<F> PathScope for F
where
	F: Fn(&str) -> bool,
{
	fn contains(&self, pathname: &str) -> bool {
		self(pathname)
	}
}

/// A scope owning every url.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPath;

impl PathScope for AnyPath {
	fn contains(&self, _pathname: &str) -> bool {
		true
	}
}

type ControllerListener = Rc<dyn Fn(&Location, Action)>;

struct ControllerInner {
	history: RefCell<Option<MemoryHistory>>,
	scope: Box<dyn PathScope>,
	parent: Weak<ControllerInner>,
	nodes: RefCell<Vec<HistoryController>>,
	listeners: RefCell<Vec<(u64, ControllerListener)>>,
	next_listener: Cell<u64>,
	gate: Cell<Option<ListenerId>>,
	prevent_default: Cell<bool>,
}

/// A history controller with bubble-up delegation to its parent.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct HistoryController {
	inner: Rc<ControllerInner>,
}

impl std::fmt::Debug for HistoryController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HistoryController")
			.field("history", &self.inner.history.borrow())
			.field("nodes", &self.inner.nodes.borrow().len())
			.field("has_parent", &self.inner.parent.upgrade().is_some())
			.field("prevent_default", &self.inner.prevent_default.get())
			.finish()
	}
}

impl HistoryController {
	/// Creates a root controller over an empty history.
	pub fn new(scope: impl PathScope + 'static) -> Self {
		Self::with_history(MemoryHistory::new(), scope)
	}

	/// Creates a root controller over an existing history.
	pub fn with_history(history: MemoryHistory, scope: impl PathScope + 'static) -> Self {
		Self::build(history, Box::new(scope), Weak::new())
	}

	fn build(history: MemoryHistory, scope: Box<dyn PathScope>, parent: Weak<ControllerInner>) -> Self {
		let controller = Self {
			inner: Rc::new(ControllerInner {
				history: RefCell::new(Some(history.clone())),
				scope,
				parent,
				nodes: RefCell::new(Vec::new()),
				listeners: RefCell::new(Vec::new()),
				next_listener: Cell::new(0),
				gate: Cell::new(None),
				prevent_default: Cell::new(false),
			}),
		};

		// One subscription per controller; the prevent-default flag is consumed
		// once per notification here, before fanning out to local listeners.
		let weak = Rc::downgrade(&controller.inner);
		let gate = history.listen(move |location, action| {
			if let Some(inner) = weak.upgrade() {
				HistoryController { inner }.fan_out(location, action);
			}
		});
		controller.inner.gate.set(Some(gate));
		controller
	}

	/// Creates a child controller that delegates to this one.
	///
	/// The child's history shares this history's confirmation handler.
	///
	/// # Errors
	///
	/// Returns [`HistoryError::Disposed`] if this controller was disposed.
	pub fn create_node(&self, scope: impl PathScope + 'static) -> HistoryResult<Self> {
		let confirmation = self.history()?.confirmation();
		let node = Self::build(
			MemoryHistory::new().with_confirmation(confirmation),
			Box::new(scope),
			Rc::downgrade(&self.inner),
		);
		self.inner.nodes.borrow_mut().push(node.clone());
		Ok(node)
	}

	/// The wrapped history.
	///
	/// # Errors
	///
	/// Returns [`HistoryError::Disposed`] after [`dispose`](Self::dispose).
	pub fn history(&self) -> HistoryResult<MemoryHistory> {
		self.inner
			.history
			.borrow()
			.clone()
			.ok_or(HistoryError::Disposed)
	}

	/// The parent controller, if any.
	pub fn parent(&self) -> Option<HistoryController> {
		self.inner.parent.upgrade().map(|inner| HistoryController { inner })
	}

	/// Whether this controller was disposed.
	pub fn is_disposed(&self) -> bool {
		self.inner.history.borrow().is_none()
	}

	/// Whether this node's own pattern accepts `url`.
	pub fn can_push(&self, url: &str) -> bool {
		self.inner.scope.contains(strip_search(url))
	}

	/// Suppresses the next local listener notification and the next bubble.
	pub fn prevent_default(&self) {
		self.inner.prevent_default.set(true);
	}

	/// Clears a pending [`prevent_default`](Self::prevent_default) that no
	/// transition consumed.
	pub fn allow_default(&self) {
		self.inner.prevent_default.set(false);
	}

	/// Pushes `url` here if this node owns it, otherwise on an ancestor.
	///
	/// # Errors
	///
	/// Fails when disposed, when no controller in the chain owns `url`, or
	/// with any error of [`MemoryHistory::push`].
	pub fn push(&self, url: &str, data: Option<Value>) -> HistoryResult<()> {
		let history = self.history()?;
		if self.can_push(url) {
			tracing::debug!(%url, "committing push locally");
			return history.push(url, data);
		}
		if self.inner.prevent_default.replace(false) {
			tracing::trace!(%url, "bubbling suppressed by prevent_default");
			return Ok(());
		}
		match self.parent() {
			Some(parent) => {
				tracing::debug!(%url, "bubbling push to parent controller");
				parent.push(url, data)
			}
			None => Err(HistoryError::Unroutable(url.to_string())),
		}
	}

	/// Replaces the current entry here if this node owns `url`, otherwise on
	/// an ancestor.
	pub fn replace(&self, url: &str, data: Option<Value>) -> HistoryResult<()> {
		let history = self.history()?;
		if self.can_push(url) {
			return history.replace(url, data);
		}
		if self.inner.prevent_default.replace(false) {
			return Ok(());
		}
		match self.parent() {
			Some(parent) => parent.replace(url, data),
			None => Err(HistoryError::Unroutable(url.to_string())),
		}
	}

	/// Steps back locally, or delegates to the parent when the local history
	/// has nothing to step back to.
	///
	/// At the root with nothing to step back to this is a no-op.
	pub fn go_back(&self) -> HistoryResult<()> {
		let history = self.history()?;
		if history.can_go(-1) {
			return history.go(-1);
		}
		match self.parent() {
			Some(parent) => {
				tracing::debug!("local history exhausted; delegating go_back to parent");
				parent.go_back()
			}
			None => {
				tracing::debug!("go_back at the root with no previous entry");
				Ok(())
			}
		}
	}

	/// Moves the local index by `n`.
	pub fn go(&self, n: isize) -> HistoryResult<()> {
		self.history()?.go(n)
	}

	/// Whether the local history can move by `n`.
	pub fn can_go(&self, n: isize) -> HistoryResult<bool> {
		Ok(self.history()?.can_go(n))
	}

	/// Silently drops the last local entry.
	pub fn rollback(&self) -> HistoryResult<Option<Location>> {
		Ok(self.history()?.rollback())
	}

	/// Installs a transition prompt on the local history.
	pub fn block<F>(&self, prompt: F) -> HistoryResult<PromptToken>
	where
		F: Fn(&Location, Action) -> PromptResult + 'static,
	{
		Ok(self.history()?.block(prompt))
	}

	/// Removes a prompt installed with [`block`](Self::block).
	pub fn unblock(&self, token: PromptToken) -> HistoryResult<bool> {
		Ok(self.history()?.unblock(token))
	}

	/// The current local entry.
	pub fn location(&self) -> HistoryResult<Option<Location>> {
		Ok(self.history()?.location())
	}

	/// Every local entry.
	pub fn entries(&self) -> HistoryResult<Vec<Location>> {
		Ok(self.history()?.entries())
	}

	/// Subscribes to local transitions.
	///
	/// Returns an id for [`unlisten`](Self::unlisten).
	pub fn listen<F>(&self, listener: F) -> HistoryResult<u64>
	where
		F: Fn(&Location, Action) + 'static,
	{
		self.history()?;
		let id = self.inner.next_listener.get();
		self.inner.next_listener.set(id + 1);
		self.inner
			.listeners
			.borrow_mut()
			.push((id, Rc::new(listener)));
		Ok(id)
	}

	/// Removes a local listener.
	pub fn unlisten(&self, id: u64) -> bool {
		let mut listeners = self.inner.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(listener_id, _)| *listener_id != id);
		listeners.len() != before
	}

	/// Disposes child nodes first, then unsubscribes everything and drops the
	/// history. Every later navigation call fails with
	/// [`HistoryError::Disposed`].
	pub fn dispose(&self) {
		let nodes: Vec<HistoryController> = self.inner.nodes.borrow_mut().drain(..).collect();
		for node in nodes {
			node.dispose();
		}
		self.inner.listeners.borrow_mut().clear();
		if let Some(history) = self.inner.history.borrow_mut().take() {
			if let Some(gate) = self.inner.gate.take() {
				history.unlisten(gate);
			}
		}
		tracing::debug!("history controller disposed");
	}

	fn fan_out(&self, location: &Location, action: Action) {
		if self.inner.prevent_default.replace(false) {
			tracing::trace!(url = %location.url, "notification suppressed by prevent_default");
			return;
		}
		let Ok(history) = self.history() else {
			return;
		};
		let revision = history.revision();
		let listeners: Vec<ControllerListener> = self
			.inner
			.listeners
			.borrow()
			.iter()
			.map(|(_, listener)| Rc::clone(listener))
			.collect();
		for listener in listeners {
			listener(location, action);
			// A listener that navigated has already announced the newer entry.
			if history.revision() != revision {
				tracing::trace!(url = %location.url, "history moved on during fan-out; skipping stale listeners");
				break;
			}
		}
	}
}
