//! Bookkeeping for in-flight and completed asynchronous loads, keyed by URL.
//!
//! A URL has at most one entry at a time. Entries move from pending to done or failed exactly once,
//! and stay there until they are [forgotten](`LoadRegistry::forget`), which is what allows loading the same URL again.

use crate::Error;
use core::{
	cell::{Cell, RefCell},
	future::Future,
};
use futures::{
	channel::oneshot,
	future::{self, FutureExt, LocalBoxFuture},
};
use gloo_timers::callback::Timeout;
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, warn};
use web_sys::Document;

/// Receives the aggregate "is anything loading" signal of a [`LoadRegistry`].
pub trait LoadingIndicator {
	fn set_loading(&self, loading: bool);
}

impl LoadingIndicator for () {
	fn set_loading(&self, _: bool) {}
}

/// State of a registered URL.
#[derive(Debug, Clone)]
pub enum LoadState {
	Pending,
	Done,
	Failed(Error),
}

#[derive(Debug)]
struct Entry {
	ticket: u64,
	state: LoadState,
}

pub struct LoadRegistry {
	entries: RefCell<HashMap<String, Entry>>,
	next_ticket: Cell<u64>,
	indicator: Box<dyn LoadingIndicator>,
}

impl core::fmt::Debug for LoadRegistry {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("LoadRegistry").field("entries", &self.entries).finish_non_exhaustive()
	}
}

impl LoadRegistry {
	#[must_use]
	pub fn new(indicator: impl LoadingIndicator + 'static) -> Rc<Self> {
		Rc::new(Self {
			entries: RefCell::default(),
			next_ticket: Cell::new(0),
			indicator: Box::new(indicator),
		})
	}

	/// Whether any entry is pending.
	#[must_use]
	pub fn is_loading(&self) -> bool {
		self.entries.borrow().values().any(|entry| matches!(entry.state, LoadState::Pending))
	}

	#[must_use]
	pub fn has_loaded(&self, url: &str) -> bool {
		matches!(self.state(url), Some(LoadState::Done))
	}

	#[must_use]
	pub fn has_failed(&self, url: &str) -> bool {
		matches!(self.state(url), Some(LoadState::Failed(_)))
	}

	#[must_use]
	pub fn state(&self, url: &str) -> Option<LoadState> {
		self.entries.borrow().get(url).map(|entry| entry.state.clone())
	}

	/// Removes the entry for `url`, whatever its state.
	pub fn forget(&self, url: &str) -> Option<LoadState> {
		let removed = self.entries.borrow_mut().remove(url).map(|entry| entry.state);
		if matches!(removed, Some(LoadState::Pending)) {
			warn!("Forgot {} while it was still loading", url);
			self.settle();
		}
		removed
	}

	/// Registers `url` as pending and hands `task` a [`Completion`] to finish it with.
	///
	/// The returned future resolves once `task` (or any clone of the handle it received) calls
	/// [`Completion::succeed`], and fails with [`Error::LoadFailure`] wrapping the cause passed to [`Completion::fail`].
	/// If every handle is dropped unfinished, the load fails as [abandoned](`Error::Abandoned`).
	///
	/// # Errors
	///
	/// The future fails immediately with [`Error::AlreadyLoading`] iff `url` already has an entry. `task` isn't run in that case.
	#[instrument(skip(self, url, task), fields(url = %url.as_ref()))]
	pub fn load<F>(self: &Rc<Self>, url: impl AsRef<str>, task: F) -> LocalBoxFuture<'static, Result<(), Error>>
	where
		F: FnOnce(Completion),
	{
		let url = url.as_ref();
		let pending = match self.begin(url) {
			Ok(pending) => pending,
			Err(error) => return future::ready(Err(error)).boxed_local(),
		};

		let (sender, receiver) = oneshot::channel();
		task(Completion(Rc::new(CompletionInner {
			pending,
			sender: RefCell::new(Some(sender)),
		})));

		let url = url.to_owned();
		async move {
			match receiver.await {
				Ok(result) => result,
				Err(oneshot::Canceled) => Err(Error::load_failure(url.clone(), Error::Abandoned(url))),
			}
		}
		.boxed_local()
	}

	/// Registers `url` as pending for as long as `future` runs, then records its outcome.
	///
	/// Failures are wrapped in [`Error::LoadFailure`]. Dropping the returned future early marks the entry as [abandoned](`Error::Abandoned`).
	///
	/// # Errors
	///
	/// Fails immediately with [`Error::AlreadyLoading`] iff `url` already has an entry, in which case `future` is dropped unpolled.
	pub fn track<T, F>(self: &Rc<Self>, url: impl AsRef<str>, future: F) -> LocalBoxFuture<'static, Result<T, Error>>
	where
		T: 'static,
		F: Future<Output = Result<T, Error>> + 'static,
	{
		let pending = match self.begin(url.as_ref()) {
			Ok(pending) => pending,
			Err(error) => return future::ready(Err(error)).boxed_local(),
		};

		async move {
			let outcome = future.await;
			pending.finish(outcome.as_ref().map(|_| ()).map_err(Clone::clone));
			outcome.map_err(|cause| Error::load_failure(pending.url.clone(), cause))
		}
		.boxed_local()
	}

	fn begin(self: &Rc<Self>, url: &str) -> Result<Pending, Error> {
		let ticket = {
			let mut entries = self.entries.borrow_mut();
			if entries.contains_key(url) {
				error!("Already loading {:?}", url);
				return Err(Error::AlreadyLoading(url.to_owned()));
			}
			let ticket = self.next_ticket.get();
			self.next_ticket.set(ticket.wrapping_add(1));
			entries.insert(
				url.to_owned(),
				Entry {
					ticket,
					state: LoadState::Pending,
				},
			);
			ticket
		};
		trace!("Loading {}", url);
		self.indicator.set_loading(true);
		Ok(Pending {
			registry: Rc::clone(self),
			url: url.to_owned(),
			ticket,
			finished: Cell::new(false),
		})
	}

	/// Records the outcome of the load identified by `ticket`.
	///
	/// Returns `false` iff that load was forgotten in the meantime, in which case nothing is recorded.
	fn finish(&self, url: &str, ticket: u64, outcome: Result<(), Error>) -> bool {
		let recorded = match self.entries.borrow_mut().get_mut(url) {
			Some(entry) if entry.ticket == ticket && matches!(entry.state, LoadState::Pending) => {
				entry.state = match &outcome {
					Ok(()) => LoadState::Done,
					Err(cause) => LoadState::Failed(cause.clone()),
				};
				true
			}
			_ => false,
		};

		if recorded {
			let motto = if outcome.is_ok() { "Loaded" } else { "Failed load of" };
			let still = if self.is_loading() { "still" } else { "done" };
			debug!("{} {}, {} loading resources", motto, url, still);
			self.settle();
		} else {
			warn!("Finished {} after it was forgotten", url);
		}
		recorded
	}

	/// Reports "not loading" to the indicator if nothing is pending.
	pub(crate) fn settle(&self) {
		if !self.is_loading() {
			self.indicator.set_loading(false);
		}
	}
}

struct Pending {
	registry: Rc<LoadRegistry>,
	url: String,
	ticket: u64,
	finished: Cell<bool>,
}

impl Pending {
	fn finish(&self, outcome: Result<(), Error>) -> bool {
		self.finished.set(true);
		self.registry.finish(&self.url, self.ticket, outcome)
	}
}

impl Drop for Pending {
	fn drop(&mut self) {
		if !self.finished.get() {
			warn!("Abandoned load of {}", self.url);
			self.registry.finish(&self.url, self.ticket, Err(Error::Abandoned(self.url.clone())));
		}
	}
}

/// Finishes a load started with [`LoadRegistry::load`].
///
/// Clones share the same load, and exactly one call to [`succeed`](`Completion::succeed`) or [`fail`](`Completion::fail`) is accepted across them.
#[derive(Clone)]
pub struct Completion(Rc<CompletionInner>);

struct CompletionInner {
	pending: Pending,
	sender: RefCell<Option<oneshot::Sender<Result<(), Error>>>>,
}

impl core::fmt::Debug for Completion {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_tuple("Completion").field(&self.0.pending.url).finish()
	}
}

impl Completion {
	#[must_use]
	pub fn url(&self) -> &str {
		&self.0.pending.url
	}

	/// # Errors
	///
	/// [`Error::CompletedTwice`] iff this load was already finished.
	pub fn succeed(&self) -> Result<(), Error> {
		self.0.complete(Ok(()))
	}

	/// # Errors
	///
	/// [`Error::CompletedTwice`] iff this load was already finished.
	pub fn fail(&self, cause: Error) -> Result<(), Error> {
		self.0.complete(Err(cause))
	}
}

impl CompletionInner {
	fn complete(&self, outcome: Result<(), Error>) -> Result<(), Error> {
		let url = &self.pending.url;
		let sender = match self.sender.borrow_mut().take() {
			Some(sender) => sender,
			None => {
				error!("finish callback called twice for {}", url);
				return Err(Error::CompletedTwice(url.clone()));
			}
		};

		self.pending.finish(outcome.clone());
		if sender.send(outcome.map_err(|cause| Error::load_failure(url.clone(), cause))).is_err() {
			trace!("Nobody is waiting for {} anymore", url);
		}
		Ok(())
	}
}

impl Drop for CompletionInner {
	fn drop(&mut self) {
		if self.sender.get_mut().is_some() {
			let url = self.pending.url.clone();
			warn!("Every completion handle for {} was dropped", url);
			// Can't fail, since the sender is still there.
			let _ = self.complete(Err(Error::Abandoned(url)));
		}
	}
}

/// Toggles a class on the document's `<body>` while anything loads.
///
/// Switching off is delayed by `debounce_ms` and cancelled if loading resumes in the meantime.
pub struct BodyClassIndicator {
	document: Document,
	class: String,
	debounce_ms: u32,
	switch_off: RefCell<Option<Timeout>>,
}

impl BodyClassIndicator {
	#[must_use]
	pub fn new(document: Document, class: impl Into<String>, debounce_ms: u32) -> Self {
		Self {
			document,
			class: class.into(),
			debounce_ms,
			switch_off: RefCell::default(),
		}
	}
}

impl LoadingIndicator for BodyClassIndicator {
	fn set_loading(&self, loading: bool) {
		let body = match self.document.body() {
			Some(body) => body,
			None => return trace!("No <body> to flag yet"),
		};

		if loading {
			// Dropping the timeout cancels it.
			drop(self.switch_off.borrow_mut().take());
			if let Err(error) = body.class_list().add_1(&self.class) {
				error!("Failed to add loading class: {:?}", error);
			}
		} else {
			let class = self.class.clone();
			*self.switch_off.borrow_mut() = Some(Timeout::new(self.debounce_ms, move || {
				if let Err(error) = body.class_list().remove_1(&class) {
					error!("Failed to remove loading class: {:?}", error);
				}
			}));
		}
	}
}
