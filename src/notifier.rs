use crate::{error::describe_js, listener::Listener, navigation::animation_end, Error, Options, Severity, View, Wui};
use core::cell::RefCell;
use gloo_timers::callback::Timeout;
use std::rc::Rc;
use tracing::{debug, error, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Window};

/// Class that plays a message's disappearing animation.
pub const DISAPPEAR_CLASS: &str = "fx-disappear";

/// Transient messages, newest first.
///
/// Each message is a `<p class="message {severity}">` that removes itself after a while or when clicked.
#[derive(Debug)]
pub struct Notifier {
	element: HtmlElement,
	styles: Vec<String>,
	message_timeout_ms: u32,
	dismissal: Dismissal,
	click: RefCell<Option<Listener>>,
}

/// Everything needed to take a message down, shared with its timer and the click handler.
#[derive(Clone)]
struct Dismissal {
	window: Window,
	animation_timeout_ms: u32,
	/// Expiry timers of the messages still shown.
	timers: Rc<RefCell<Vec<(Element, Timeout)>>>,
}

impl core::fmt::Debug for Dismissal {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Dismissal")
			.field("animation_timeout_ms", &self.animation_timeout_ms)
			.field("pending", &self.timers.borrow().len())
			.finish_non_exhaustive()
	}
}

impl Notifier {
	/// # Errors
	///
	/// Iff the container element can't be created.
	pub fn new(document: &Document, options: &Options) -> Result<Self, Error> {
		let window = document.default_view().ok_or_else(|| Error::Js("document has no window".to_owned()))?;
		let element = document.create_element("div")?.dyn_into::<HtmlElement>().map_err(|element| Error::Js(format!("{:?} is not an HTML element", element)))?;
		Ok(Self {
			element,
			styles: options.notifier_stylesheets.iter().map(|name| options.resolve_asset(name)).collect(),
			message_timeout_ms: options.message_timeout_ms,
			dismissal: Dismissal {
				window,
				animation_timeout_ms: options.exit_timeout_ms,
				timers: Rc::default(),
			},
			click: RefCell::default(),
		})
	}

	/// Shows `text` on the channel for `severity`. [`Severity::Log`] is only logged.
	///
	/// # Errors
	///
	/// Iff the message element can't be created or inserted.
	pub fn message(&self, severity: Severity, text: &str) -> Result<Option<Element>, Error> {
		if severity == Severity::Log {
			info!("{}", text);
			return Ok(None);
		}

		let document = self.element.owner_document().ok_or_else(|| Error::Js("notifier is detached".to_owned()))?;
		let message = document.create_element("p")?;
		message.class_list().add_2("message", severity.as_str())?;
		message.set_text_content(Some(text));
		self.element.prepend_with_node_1(&message)?;
		debug!("{} message: {}", severity.as_str(), text);

		let dismissal = self.dismissal.clone();
		let expired = message.clone();
		let timer = Timeout::new(self.message_timeout_ms, move || dismissal.dismiss(expired));
		self.dismissal.timers.borrow_mut().push((message.clone(), timer));
		Ok(Some(message))
	}

	/// How many messages are still waiting to expire.
	#[must_use]
	pub fn pending(&self) -> usize {
		self.dismissal.timers.borrow().len()
	}

	pub fn error(&self, text: &str) {
		self.report(Severity::Error, text);
	}

	pub fn warn(&self, text: &str) {
		self.report(Severity::Warn, text);
	}

	pub fn info(&self, text: &str) {
		self.report(Severity::Info, text);
	}

	fn report(&self, severity: Severity, text: &str) {
		if let Err(error) = self.message(severity, text) {
			error!("Failed to show {:?} ({}): {}", text, severity.as_str(), error);
		}
	}
}

impl Dismissal {
	/// Plays the disappearing animation of `message` (if any), then removes it.
	///
	/// The message's expiry timer is cancelled from a separate task, since this may run inside that timer's callback.
	fn dismiss(&self, message: Element) {
		let connected = message.is_connected();
		if connected {
			if let Err(error) = message.class_list().add_1(DISAPPEAR_CLASS) {
				warn!("{}", describe_js(&error));
			}
		}

		let this = self.clone();
		wasm_bindgen_futures::spawn_local(async move {
			this.timers.borrow_mut().retain(|(shown, _)| shown != &message);
			if !connected {
				return;
			}
			if let Err(error) = animation_end(&this.window, &message, this.animation_timeout_ms).await {
				warn!("{}", error);
			}
			message.remove();
		});
	}
}

impl View for Notifier {
	fn name(&self) -> &str {
		"Notifier"
	}

	fn element(&self) -> &HtmlElement {
		&self.element
	}

	fn styles(&self) -> &[String] {
		&self.styles
	}

	fn ready(&self, _wui: &Wui) -> Result<(), Error> {
		let dismissal = self.dismissal.clone();
		let listener = Listener::new(self.element.as_ref(), "click", move |event| {
			let message = event
				.target()
				.and_then(|target| target.dyn_into::<Element>().ok())
				.filter(|element| element.class_list().contains("message"));
			if let Some(message) = message {
				dismissal.dismiss(message);
			}
		})?;
		*self.click.borrow_mut() = Some(listener);
		Ok(())
	}
}
