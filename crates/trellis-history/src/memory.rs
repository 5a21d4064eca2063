//! Stack-based in-memory history.
//!
//! [`MemoryHistory`] keeps an ordered list of [`Location`]s plus the index of
//! the current entry. Every transition except [`MemoryHistory::rollback`] goes
//! through the confirmation gate:
//!
//! ```text
//! push/replace/go
//!     → prompt installed?  no  → commit
//!     → prompt(location, action)
//!         Allow        → commit
//!         Block        → reject
//!         Confirm(msg) → get_user_confirmation(msg, callback)
//!                          callback(true)  → commit
//!                          callback(false) → reject
//! ```
//!
//! A rejected `go` still notifies listeners with the unchanged location.

use crate::error::{HistoryError, HistoryResult};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// The kind of the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
	/// A new entry was appended.
	Push,
	/// The current entry was overwritten.
	Replace,
	/// The index moved within existing entries.
	Pop,
}

impl std::fmt::Display for Action {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Push => write!(f, "PUSH"),
			Self::Replace => write!(f, "REPLACE"),
			Self::Pop => write!(f, "POP"),
		}
	}
}

/// Outcome of a transition prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
	/// Commit the transition without asking.
	Allow,
	/// Reject the transition.
	Block,
	/// Ask the user through the injected confirmation handler.
	Confirm(String),
}

/// Identifier of a history listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Token returned by [`MemoryHistory::block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptToken(u64);

/// Listener invoked after every committed (or rejected `go`) transition.
pub type Listener = Rc<dyn Fn(&Location, Action)>;

/// Prompt consulted before a transition commits.
pub type Prompt = Rc<dyn Fn(&Location, Action) -> PromptResult>;

/// Callback handed to the confirmation handler; `true` commits.
pub type ConfirmCallback = Box<dyn FnOnce(bool)>;

/// Injected user confirmation handler. It may call the callback later.
pub type UserConfirmation = Rc<dyn Fn(&str, ConfirmCallback)>;

enum Transition {
	Push(Location),
	Replace(Location),
	Go(usize),
}

impl Transition {
	fn action(&self) -> Action {
		match self {
			Self::Push(_) => Action::Push,
			Self::Replace(_) => Action::Replace,
			Self::Go(_) => Action::Pop,
		}
	}
}

struct HistoryInner {
	entries: Vec<Location>,
	index: Option<usize>,
	action: Action,
	listeners: Vec<(ListenerId, Listener)>,
	next_listener: u64,
	prompt: Option<(PromptToken, Prompt)>,
	next_prompt: u64,
	confirmation: Option<UserConfirmation>,
	pending: bool,
	revision: u64,
}

/// A single in-memory navigation timeline.
///
/// Cloning yields another handle to the same timeline.
#[derive(Clone)]
pub struct MemoryHistory {
	inner: Rc<RefCell<HistoryInner>>,
}

impl std::fmt::Debug for MemoryHistory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.borrow();
		f.debug_struct("MemoryHistory")
			.field("length", &inner.entries.len())
			.field("index", &inner.index)
			.field("action", &inner.action)
			.field("has_prompt", &inner.prompt.is_some())
			.finish()
	}
}

impl Default for MemoryHistory {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryHistory {
	/// Creates an empty history.
	pub fn new() -> Self {
		Self {
			inner: Rc::new(RefCell::new(HistoryInner {
				entries: Vec::new(),
				index: None,
				action: Action::Pop,
				listeners: Vec::new(),
				next_listener: 0,
				prompt: None,
				next_prompt: 0,
				confirmation: None,
				pending: false,
				revision: 0,
			})),
		}
	}

	/// Creates a history seeded with `paths`, positioned on the last one.
	pub fn with_entries<I, S>(paths: I) -> HistoryResult<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let history = Self::new();
		{
			let mut inner = history.inner.borrow_mut();
			for path in paths {
				inner.entries.push(Location::parse(path.as_ref())?);
			}
			inner.index = inner.entries.len().checked_sub(1);
		}
		Ok(history)
	}

	/// Injects the handler used for [`PromptResult::Confirm`] prompts.
	pub fn with_confirmation(self, confirmation: Option<UserConfirmation>) -> Self {
		self.inner.borrow_mut().confirmation = confirmation;
		self
	}

	/// Returns the injected confirmation handler.
	pub fn confirmation(&self) -> Option<UserConfirmation> {
		self.inner.borrow().confirmation.clone()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.inner.borrow().entries.len()
	}

	/// Returns `true` when the timeline has no entries.
	pub fn is_empty(&self) -> bool {
		self.inner.borrow().entries.is_empty()
	}

	/// Index of the current entry, `None` while empty.
	pub fn index(&self) -> Option<usize> {
		self.inner.borrow().index
	}

	/// The last transition kind.
	pub fn action(&self) -> Action {
		self.inner.borrow().action
	}

	/// The current entry.
	pub fn location(&self) -> Option<Location> {
		let inner = self.inner.borrow();
		inner.index.and_then(|i| inner.entries.get(i).cloned())
	}

	/// A snapshot of every entry.
	pub fn entries(&self) -> Vec<Location> {
		self.inner.borrow().entries.clone()
	}

	/// Whether a transition is waiting for a confirmation decision.
	pub fn is_pending(&self) -> bool {
		self.inner.borrow().pending
	}

	/// Whether `index + n` lands on an existing entry.
	pub fn can_go(&self, n: isize) -> bool {
		let inner = self.inner.borrow();
		match inner.index {
			Some(index) => index
				.checked_add_signed(n)
				.is_some_and(|target| target < inner.entries.len()),
			None => false,
		}
	}

	/// Appends a new entry after the current one, dropping forward entries.
	///
	/// # Errors
	///
	/// Fails when `path` is malformed or a confirmation is pending.
	pub fn push(&self, path: &str, state: Option<Value>) -> HistoryResult<()> {
		let location = Location::resolve(path, self.location().as_ref())?.with_state(state);
		self.transition(Transition::Push(location))
	}

	/// Overwrites the current entry.
	pub fn replace(&self, path: &str, state: Option<Value>) -> HistoryResult<()> {
		let location = Location::resolve(path, self.location().as_ref())?.with_state(state);
		self.transition(Transition::Replace(location))
	}

	/// Moves the index by `n`, clamped to the existing entries.
	pub fn go(&self, n: isize) -> HistoryResult<()> {
		let target = {
			let inner = self.inner.borrow();
			let Some(index) = inner.index else {
				return Ok(());
			};
			let last = inner.entries.len() - 1;
			index.saturating_add_signed(n).min(last)
		};
		self.transition(Transition::Go(target))
	}

	/// Steps back one entry.
	pub fn go_back(&self) -> HistoryResult<()> {
		self.go(-1)
	}

	/// Steps forward one entry.
	pub fn go_forward(&self) -> HistoryResult<()> {
		self.go(1)
	}

	/// Silently removes the last entry.
	///
	/// No prompt is consulted and no listener is notified.
	pub fn rollback(&self) -> Option<Location> {
		let mut inner = self.inner.borrow_mut();
		let removed = inner.entries.pop();
		inner.index = inner.entries.len().checked_sub(1);
		inner.revision += 1;
		if let Some(location) = &removed {
			tracing::trace!(url = %location.url, "rolled back history entry");
		}
		removed
	}

	/// Installs the transition prompt, replacing any previous one.
	pub fn block<F>(&self, prompt: F) -> PromptToken
	where
		F: Fn(&Location, Action) -> PromptResult + 'static,
	{
		let mut inner = self.inner.borrow_mut();
		if inner.prompt.is_some() {
			tracing::warn!("a transition prompt is already installed; replacing it");
		}
		let token = PromptToken(inner.next_prompt);
		inner.next_prompt += 1;
		inner.prompt = Some((token, Rc::new(prompt)));
		token
	}

	/// Removes the prompt installed with `token`.
	///
	/// Returns `false` if that prompt was already superseded or removed.
	pub fn unblock(&self, token: PromptToken) -> bool {
		let mut inner = self.inner.borrow_mut();
		match &inner.prompt {
			Some((current, _)) if *current == token => {
				inner.prompt = None;
				true
			}
			_ => false,
		}
	}

	/// Subscribes to transitions.
	pub fn listen<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&Location, Action) + 'static,
	{
		let mut inner = self.inner.borrow_mut();
		let id = ListenerId(inner.next_listener);
		inner.next_listener += 1;
		inner.listeners.push((id, Rc::new(listener)));
		id
	}

	/// Removes a listener. Returns `false` if it was not subscribed.
	pub fn unlisten(&self, id: ListenerId) -> bool {
		let mut inner = self.inner.borrow_mut();
		let before = inner.listeners.len();
		inner.listeners.retain(|(listener_id, _)| *listener_id != id);
		inner.listeners.len() != before
	}

	/// A counter bumped by every notification and every rollback.
	///
	/// A listener that observes a different revision after another listener
	/// returned knows the location it was handed is stale.
	pub fn revision(&self) -> u64 {
		self.inner.borrow().revision
	}

	/// Number of subscribed listeners.
	pub fn listener_count(&self) -> usize {
		self.inner.borrow().listeners.len()
	}

	fn transition(&self, transition: Transition) -> HistoryResult<()> {
		let (prompt, confirmation) = {
			let inner = self.inner.borrow();
			if inner.pending {
				return Err(HistoryError::TransitionPending);
			}
			(
				inner.prompt.as_ref().map(|(_, prompt)| Rc::clone(prompt)),
				inner.confirmation.clone(),
			)
		};

		let Some(prompt) = prompt else {
			self.settle(transition, true);
			return Ok(());
		};

		let action = transition.action();
		let target = match &transition {
			Transition::Push(location) | Transition::Replace(location) => location.clone(),
			Transition::Go(index) => match self.inner.borrow().entries.get(*index) {
				Some(location) => location.clone(),
				None => return Ok(()),
			},
		};

		match prompt(&target, action) {
			PromptResult::Allow => self.settle(transition, true),
			PromptResult::Block => self.settle(transition, false),
			PromptResult::Confirm(message) => match confirmation {
				None => {
					tracing::warn!(
						%message,
						"prompt requested confirmation but no confirmation handler is installed"
					);
					self.settle(transition, true);
				}
				Some(confirm) => {
					self.inner.borrow_mut().pending = true;
					let weak: Weak<RefCell<HistoryInner>> = Rc::downgrade(&self.inner);
					confirm(
						&message,
						Box::new(move |ok| {
							if let Some(inner) = weak.upgrade() {
								inner.borrow_mut().pending = false;
								MemoryHistory { inner }.settle(transition, ok);
							}
						}),
					);
				}
			},
		}
		Ok(())
	}

	fn settle(&self, transition: Transition, ok: bool) {
		if !ok {
			tracing::debug!(action = %transition.action(), "transition rejected");
			// A cancelled POP still needs listeners to re-render the unchanged state.
			if matches!(transition, Transition::Go(_)) {
				self.notify();
			}
			return;
		}

		{
			let mut inner = self.inner.borrow_mut();
			match transition {
				Transition::Push(location) => {
					let keep = inner.index.map_or(0, |index| index + 1);
					inner.entries.truncate(keep);
					inner.entries.push(location);
					inner.index = Some(inner.entries.len() - 1);
					inner.action = Action::Push;
				}
				Transition::Replace(location) => {
					match inner.index {
						Some(index) => inner.entries[index] = location,
						None => {
							inner.entries.push(location);
							inner.index = Some(0);
						}
					}
					inner.action = Action::Replace;
				}
				Transition::Go(index) => {
					inner.index = Some(index);
					inner.action = Action::Pop;
				}
			}
		}
		self.notify();
	}

	fn notify(&self) {
		let (location, action, listeners, revision) = {
			let mut inner = self.inner.borrow_mut();
			inner.revision += 1;
			let Some(location) = inner.index.and_then(|i| inner.entries.get(i).cloned()) else {
				return;
			};
			let listeners: Vec<Listener> = inner
				.listeners
				.iter()
				.map(|(_, listener)| Rc::clone(listener))
				.collect();
			(location, inner.action, listeners, inner.revision)
		};
		for listener in listeners {
			listener(&location, action);
			if self.revision() != revision {
				tracing::trace!(url = %location.url, "history moved on during notification; stopping fan-out");
				break;
			}
		}
	}
}
