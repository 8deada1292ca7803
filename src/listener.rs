use crate::Error;
use core::fmt::{self, Debug};
use futures::channel::oneshot;
use tracing::{error, trace};
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Event, EventTarget};

/// An event listener that stays registered for as long as this handle lives.
///
/// The [`Closure`] is owned here, so JavaScript can't call into freed memory:
/// dropping the handle removes the listener before the closure is destroyed.
pub struct Listener {
	target: EventTarget,
	event: &'static str,
	closure: Closure<dyn FnMut(Event)>,
}

impl Debug for Listener {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener").field("target", &self.target).field("event", &self.event).finish_non_exhaustive()
	}
}

impl Listener {
	/// # Errors
	///
	/// Iff the browser refuses the listener.
	pub fn new(target: &EventTarget, event: &'static str, handler: impl FnMut(Event) + 'static) -> Result<Self, Error> {
		let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
		target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
		trace!("Listening for {:?}.", event);
		Ok(Self {
			target: target.clone(),
			event,
			closure,
		})
	}

	#[must_use]
	pub fn event(&self) -> &'static str {
		self.event
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		match self.target.remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref()) {
			Ok(()) => trace!("Stopped listening for {:?}.", self.event),
			Err(error) => error!("Failed to remove {:?} listener: {:?}", self.event, error),
		}
	}
}

/// Resolves with the first `event` on `target` that `accept` lets through.
///
/// The listener is removed as soon as the future completes or is dropped.
///
/// # Errors
///
/// Iff the listener can't be added.
pub async fn next_event(target: &EventTarget, event: &'static str, mut accept: impl FnMut(&Event) -> bool + 'static) -> Result<Event, Error> {
	let (sender, receiver) = oneshot::channel();
	let mut sender = Some(sender);
	let _listener = Listener::new(target, event, move |fired| {
		if accept(&fired) {
			if let Some(sender) = sender.take() {
				// The receiver only disappears together with this listener.
				let _ = sender.send(fired);
			}
		}
	})?;
	receiver.await.map_err(|_| Error::Js(format!("{} listener went away", event)))
}
