use crate::{
	error::describe_js,
	form::{self, DisabledControls},
	http::{Gateway, Reply, RequestOptions, Response},
	listener::{next_event, Listener},
	navigation,
	registry::{BodyClassIndicator, LoadRegistry, LoadState},
	section::SectionStore,
	Error, Notifier, Options, PluginRegistry, Section, Severity, View,
};
use core::{
	cell::{Cell, RefCell},
	future::Future,
};
use futures::future::join_all;
use gloo_timers::callback::Timeout;
use js_sys::{Function, JSON};
use serde_json::Value;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
	CustomEvent, CustomEventInit, Document, DocumentFragment, Element, Event, EventTarget, HtmlElement, HtmlFormElement, HtmlHeadElement, HtmlLinkElement,
	Node, PopStateEvent, PromiseRejectionEvent, SubmitEvent, Window,
};

/// Name of the event dispatched on a form right before its payload is sent.
pub const SUBMIT_EVENT: &str = "wui:submit";

thread_local! {
	static INSTALLED: RefCell<Option<Wui>> = RefCell::new(None);
}

/// The runtime's context object.
///
/// Create one per document with [`Wui::new`] (or [`Wui::bootstrap`]) and [initialize](`Wui::initialize`) it once.
/// Clones share the same state.
///
/// The event handlers only hold on to the runtime weakly. Once the last clone is dropped, the window handlers are
/// removed and intercepted links are released back to the browser. [`Wui::bootstrap`] [installs](`Wui::install`)
/// its runtime for the rest of the page's lifetime.
#[derive(Clone)]
pub struct Wui(Rc<Inner>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	Created,
	Initializing,
	Ready,
}

#[derive(Debug, Clone)]
struct Dom {
	head: HtmlHeadElement,
	body: HtmlElement,
	main: Element,
}

struct Inner {
	options: Options,
	window: Window,
	document: Document,
	phase: Cell<Phase>,
	dom: RefCell<Option<Dom>>,
	loads: Rc<LoadRegistry>,
	sections: RefCell<SectionStore>,
	plugins: RefCell<PluginRegistry>,
	notifier: RefCell<Option<Rc<Notifier>>>,
	gateway: Gateway,
	listeners: RefCell<Vec<Listener>>,
	navigate: Closure<dyn FnMut(Event)>,
}

impl Drop for Inner {
	fn drop(&mut self) {
		let released = navigation::unbind_links(&self.document, self.navigate.as_ref().unchecked_ref());
		debug!("Wui dropped, released {} link(s)", released);
	}
}

impl core::fmt::Debug for Wui {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Wui")
			.field("phase", &self.0.phase.get())
			.field("loads", &self.0.loads)
			.field("sections", &self.0.sections.borrow().len())
			.field("plugins", &self.0.plugins)
			.finish_non_exhaustive()
	}
}

/// Wraps `handler` so that it only runs while the [`Wui`] is alive.
fn weak_handler(weak: &Weak<Inner>, handler: impl Fn(&Wui, Event) + 'static) -> impl FnMut(Event) + 'static {
	let weak = weak.clone();
	move |event| match weak.upgrade() {
		Some(inner) => handler(&Wui(inner), event),
		None => trace!("Event after the Wui was dropped"),
	}
}

impl Wui {
	/// Binds a runtime to `document`, sending requests through `fetch`.
	///
	/// # Errors
	///
	/// Iff `document` has no window.
	pub fn new(document: Document, options: Options) -> Result<Self, Error> {
		Self::with_gateway(document, options, Gateway::default())
	}

	/// # Errors
	///
	/// Iff `document` has no window.
	pub fn with_gateway(document: Document, options: Options, gateway: Gateway) -> Result<Self, Error> {
		let window = document.default_view().ok_or_else(|| Error::Js("document has no window".to_owned()))?;
		let loads = LoadRegistry::new(BodyClassIndicator::new(document.clone(), options.loading_class.clone(), options.loading_debounce_ms));
		Ok(Self(Rc::new_cyclic(|weak| Inner {
			navigate: Closure::wrap(Box::new(weak_handler(weak, |wui, event| {
				if let Err(error) = wui.navigate(&event) {
					wui.fail(&error);
				}
			})) as Box<dyn FnMut(Event)>),
			options,
			window,
			document,
			phase: Cell::new(Phase::Created),
			dom: RefCell::default(),
			loads,
			sections: RefCell::default(),
			plugins: RefCell::default(),
			notifier: RefCell::default(),
			gateway,
			listeners: RefCell::default(),
		})))
	}

	/// Creates a runtime configured from the document (see [`Options::from_document`]) and initializes it.
	///
	/// # Errors
	///
	/// Iff the options are invalid or [initialization](`Wui::initialize`) fails.
	pub async fn bootstrap(document: Document) -> Result<Self, Error> {
		let options = Options::from_document(&document)?;
		let wui = Self::new(document, options)?;
		wui.initialize().await?;
		wui.install();
		Ok(wui)
	}

	/// Keeps this runtime alive until [`Wui::uninstall`], replacing any runtime installed before.
	pub fn install(&self) {
		if let Some(previous) = INSTALLED.with(|slot| slot.borrow_mut().replace(self.clone())) {
			warn!("Replaced an installed runtime: {:?}", previous);
		}
	}

	/// The runtime kept alive by [`Wui::install`], if any.
	#[must_use]
	pub fn installed() -> Option<Self> {
		INSTALLED.with(|slot| slot.borrow().clone())
	}

	/// Releases the installed runtime. It shuts down once the returned handle and every other clone are dropped.
	pub fn uninstall() -> Option<Self> {
		INSTALLED.with(|slot| slot.borrow_mut().take())
	}

	/// Routes clicks on links that aren't intercepted yet through [`Wui::navigate`].
	///
	/// Called after every rendered section. Content deployed by other means may need it too.
	pub fn bind_links(&self) -> usize {
		navigation::bind_links(&self.0.document, self.navigate_handler())
	}

	#[must_use]
	pub fn options(&self) -> &Options {
		&self.0.options
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.0.document
	}

	#[must_use]
	pub fn loads(&self) -> &Rc<LoadRegistry> {
		&self.0.loads
	}

	/// Whether the document containers are known, which is the case from `DOMContentLoaded` on.
	#[must_use]
	pub fn is_initialized(&self) -> bool {
		self.0.dom.borrow().is_some()
	}

	fn dom(&self) -> Result<Dom, Error> {
		self.0.dom.borrow().clone().ok_or(Error::NotInitialized)
	}

	/// The container sections are inserted into.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`.
	pub fn main(&self) -> Result<Element, Error> {
		self.dom().map(|dom| dom.main)
	}

	#[must_use]
	pub fn notifier(&self) -> Option<Rc<Notifier>> {
		self.0.notifier.borrow().clone()
	}

	#[must_use]
	pub fn plugin_view(&self, id: &str) -> Option<Rc<dyn View>> {
		self.0.plugins.borrow().get(id)
	}

	/// Looks up a section shown earlier, by route or URL.
	#[must_use]
	pub fn stored_section(&self, target: &str) -> Option<Section> {
		self.0.sections.borrow().find(target).cloned()
	}

	/// Waits for `DOMContentLoaded`, prepares the document, loads the stylesheets,
	/// registers the `notify` plugin and installs the window event handlers.
	///
	/// Calling this again after it succeeded does nothing.
	///
	/// # Errors
	///
	/// [`Error::AlreadyLoading`] while another initialization is running, and any failure of the steps above.
	#[instrument(skip(self))]
	pub async fn initialize(&self) -> Result<(), Error> {
		match self.0.phase.get() {
			Phase::Ready => return Ok(()),
			Phase::Initializing => return Err(Error::AlreadyLoading("initialization".to_owned())),
			Phase::Created => self.0.phase.set(Phase::Initializing),
		}
		let result = self.prepare().await;
		self.0.phase.set(if result.is_ok() { Phase::Ready } else { Phase::Created });
		result
	}

	async fn prepare(&self) -> Result<(), Error> {
		let options = &self.0.options;
		let document = &self.0.document;
		if let Some(body) = document.body() {
			body.class_list().add_1(&options.loading_class)?;
		}

		if document.ready_state() == "loading" {
			debug!("Waiting for DOMContentLoaded");
			next_event(document.as_ref(), "DOMContentLoaded", |_| true).await?;
		}

		if !self.is_initialized() {
			let head = document.head().ok_or_else(|| Error::Js("document has no <head>".to_owned()))?;
			let body = document.body().ok_or_else(|| Error::Js("document has no <body>".to_owned()))?;
			let main = match document.query_selector(&options.main_selector)? {
				Some(main) => main,
				None => {
					warn!("There is no main container, will inject one");
					let main = document.create_element("main")?;
					body.append_child(&main)?;
					main
				}
			};
			*self.0.dom.borrow_mut() = Some(Dom { head, body, main });
			info!("WUI initialized (DOMContentLoaded)");
		}
		let dom = self.dom()?;

		if document.query_selector("meta[name=viewport]")?.is_none() {
			warn!("There is no viewport meta tag");
			if options.inject_viewport {
				let meta = document.create_element("meta")?;
				meta.set_attribute("name", "viewport")?;
				meta.set_attribute("content", "width=device-width, initial-scale=1, maximum-scale=2")?;
				dom.head.append_child(&meta)?;
			}
		}
		if document.query_selector("link[rel=manifest]")?.is_none() {
			warn!("There is no web manifest link");
		}

		let stylesheets: Vec<String> = options.stylesheets.iter().map(|name| options.resolve_asset(name)).collect();
		self.assets(&stylesheets).await?;

		if self.notifier().is_none() {
			let notifier = Rc::new(Notifier::new(document, options)?);
			self.plugin("notify", Rc::clone(&notifier) as Rc<dyn View>).await?;
			*self.0.notifier.borrow_mut() = Some(Rc::clone(&notifier));
			self.deploy(&(notifier as Rc<dyn View>), None)?;
		}

		self.install_handlers()?;
		info!("window event handlers bound");

		self.bind_links();
		navigation::sync_selection(&self.0.window, document, &options.selected_class)?;
		self.0.loads.settle();
		Ok(())
	}

	fn install_handlers(&self) -> Result<(), Error> {
		let mut listeners = self.0.listeners.borrow_mut();
		if !listeners.is_empty() {
			return Ok(());
		}

		let window: &EventTarget = self.0.window.as_ref();
		let weak = Rc::downgrade(&self.0);
		listeners.push(Listener::new(
			window,
			"unhandledrejection",
			weak_handler(&weak, |wui, event| {
				let reason = event.dyn_ref::<PromiseRejectionEvent>().map_or(JsValue::UNDEFINED, PromiseRejectionEvent::reason);
				wui.fail(&Error::Js(describe_js(&reason)));
			}),
		)?);
		listeners.push(Listener::new(
			window,
			"beforeunload",
			weak_handler(&weak, |_, event| {
				warn!("will unload window");
				debug!("{:?}", event);
			}),
		)?);
		listeners.push(Listener::new(
			window,
			"popstate",
			weak_handler(&weak, |wui, event| {
				let state = event.dyn_ref::<PopStateEvent>().map_or(JsValue::NULL, PopStateEvent::state);
				let restoring = wui.clone();
				wui.spawn(async move { restoring.restore(&state).await.map(drop) });
			}),
		)?);
		listeners.push(Listener::new(
			window,
			"submit",
			weak_handler(&weak, |wui, event| {
				let form = match event.target().and_then(|target| target.dyn_into::<HtmlFormElement>().ok()) {
					Some(form) => form,
					None => return,
				};
				event.prevent_default();
				let submitter = event.dyn_ref::<SubmitEvent>().and_then(SubmitEvent::submitter);
				let submitting = wui.clone();
				wui.spawn(async move { submitting.submit(&form, submitter.as_deref()).await });
			}),
		)?);
		Ok(())
	}

	fn navigate_handler(&self) -> &Function {
		self.0.navigate.as_ref().unchecked_ref()
	}

	/// Runs `future` on the event loop and reports its failure through [`Wui::fail`].
	pub fn spawn(&self, future: impl Future<Output = Result<(), Error>> + 'static) {
		let wui = self.clone();
		spawn_local(async move {
			if let Err(error) = future.await {
				wui.fail(&error);
			}
		});
	}

	/// Reports `error` through the notifier (once registered) and the log.
	pub fn fail(&self, error: &Error) {
		match error {
			Error::LoadFailure { cause, .. } => {
				self.notify(Severity::Warn, &format!("{} (caused by {})", error, cause.code()));
				warn!("{:?}", error);
				self.fail(cause);
			}
			Error::Http(http) => {
				self.notify(http.severity(), &http.to_string());
				info!("{:?}", http);
			}
			_ => {
				self.notify(Severity::Error, &format!("Unhandled rejection: {} ({})", error, error.code()));
				error!("{:?}", error);
			}
		}
	}

	fn notify(&self, severity: Severity, text: &str) {
		let notifier = match self.notifier() {
			Some(notifier) => notifier,
			None => {
				debug!("No notifier for {} message {:?}", severity.as_str(), text);
				return;
			}
		};
		match severity {
			Severity::Error => notifier.error(text),
			Severity::Warn => notifier.warn(text),
			Severity::Info => notifier.info(text),
			Severity::Log => info!("{}", text),
		}
	}

	/// Registers `view` as plugin `id` and loads its stylesheets.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`, registration errors (see [`PluginRegistry::register`]) and stylesheet failures.
	#[instrument(skip(self, view))]
	pub async fn plugin(&self, id: &str, view: Rc<dyn View>) -> Result<(), Error> {
		if !self.is_initialized() {
			return Err(Error::NotInitialized);
		}
		self.0.plugins.borrow_mut().register(id, Rc::clone(&view))?;
		info!("registered {} plugin as #{}", view.name(), id);

		if !view.styles().is_empty() {
			self.assets(view.styles()).await?;
		}
		Ok(())
	}

	/// Registers and deploys several plugins, in order.
	///
	/// # Errors
	///
	/// The first failure of [`Wui::plugin`] or [`Wui::deploy`].
	pub async fn plugins(&self, views: impl IntoIterator<Item = (String, Rc<dyn View>)>) -> Result<(), Error> {
		for (id, view) in views {
			self.plugin(&id, Rc::clone(&view)).await?;
			self.deploy(&view, None)?;
		}
		Ok(())
	}

	/// Appends `view`'s element to `container` (by default `<body>`) and tells the view it's ready.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`, DOM failures and failures of [`View::ready`].
	pub fn deploy(&self, view: &Rc<dyn View>, container: Option<&Element>) -> Result<(), Error> {
		self.deploy_node(view.element(), container)?;
		view.ready(self)
	}

	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`, and DOM failures.
	pub fn deploy_node(&self, node: &Node, container: Option<&Element>) -> Result<(), Error> {
		let dom = self.dom()?;
		container.unwrap_or(&dom.body).append_child(node)?;
		Ok(())
	}

	/// Appends `text` as text, never as markup.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`, and DOM failures.
	pub fn deploy_text(&self, text: &str, container: Option<&Element>) -> Result<(), Error> {
		let dom = self.dom()?;
		container.unwrap_or(&dom.body).insert_adjacent_text("beforeend", text)?;
		Ok(())
	}

	/// Parses HTML strings (joined by newlines) into a detached fragment.
	///
	/// # Errors
	///
	/// Iff the scratch element can't be created.
	pub fn template(&self, html: &[&str]) -> Result<DocumentFragment, Error> {
		let document = &self.0.document;
		let scratch = document.create_element("div")?;
		scratch.set_inner_html(&html.join("\n"));
		let fragment = document.create_document_fragment();
		while let Some(child) = scratch.first_child() {
			fragment.append_child(&child)?;
		}
		Ok(fragment)
	}

	/// Loads stylesheets concurrently. Already linked ones count as loaded.
	///
	/// # Errors
	///
	/// The first failure among them, as [`Error::LoadFailure`].
	pub async fn assets(&self, urls: &[String]) -> Result<(), Error> {
		let results = join_all(urls.iter().map(|url| self.asset(url))).await;
		results.into_iter().collect()
	}

	/// Links the stylesheet at `url` into `<head>` and waits for it.
	///
	/// Stylesheets that loaded before, or that the page links by itself, count as loaded.
	/// A failed stylesheet's link is removed again, and asking for it later retries it.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`] before `DOMContentLoaded`, [`Error::AlreadyLoading`] and [`Error::LoadFailure`].
	#[instrument(skip(self))]
	pub async fn asset(&self, url: &str) -> Result<(), Error> {
		let dom = self.dom()?;
		match self.0.loads.state(url) {
			Some(LoadState::Done) => return Ok(()),
			Some(LoadState::Failed(cause)) => {
				debug!("Retrying {} after {}", url, cause.code());
				self.0.loads.forget(url);
			}
			Some(LoadState::Pending) | None => (),
		}

		let document = &self.0.document;
		let selector = format!(r#"link[rel=stylesheet][href="{}"]"#, url.replace('\\', "\\\\").replace('"', "\\\""));
		if document.query_selector(&selector)?.is_some() {
			trace!("{} is already linked", url);
			return Ok(());
		}

		let link = document
			.create_element("link")?
			.dyn_into::<HtmlLinkElement>()
			.map_err(|element| Error::Js(format!("{:?} is not a <link>", element)))?;
		link.set_rel("stylesheet");
		link.set_href(url);

		self.0
			.loads
			.load(url, |done| {
				let loaded = done.clone();
				let failed = done.clone();
				let href = url.to_owned();
				let broken = link.clone();
				link.set_onload(Some(
					Closure::once_into_js(move || {
						if let Err(error) = loaded.succeed() {
							error!("{}", error);
						}
					})
					.unchecked_ref(),
				));
				link.set_onerror(Some(
					Closure::once_into_js(move || {
						broken.remove();
						if let Err(error) = failed.fail(Error::Network(format!("stylesheet {} could not be loaded", href))) {
							error!("{}", error);
						}
					})
					.unchecked_ref(),
				));
				if let Err(error) = dom.head.append_child(&link) {
					// Can't have been completed yet, the link wasn't in the document.
					let _ = done.fail(error.into());
				}
			})
			.await
	}

	/// Fetches the section at `location` and [shows](`Wui::show`) it.
	///
	/// The location is registered with the load registry while this runs, and forgotten afterwards either way.
	///
	/// # Errors
	///
	/// [`Error::AlreadyLoading`] while the same location is being displayed, otherwise [`Error::LoadFailure`].
	#[instrument(skip(self))]
	pub async fn display(&self, location: &str) -> Result<Section, Error> {
		let wui = self.clone();
		let url = location.to_owned();
		let result = self
			.0
			.loads
			.track(location, async move {
				let reply = wui.0.gateway.request(&url, RequestOptions::default(), "display").await?;
				wui.announce(reply.response());
				let section: Section = reply.response().json()?;
				wui.show(section).await
			})
			.await;
		if !matches!(result, Err(Error::AlreadyLoading(_))) {
			self.0.loads.forget(location);
		}
		result
	}

	/// Click handler of intercepted links.
	///
	/// Links with a `target` attribute or a same-page `#` href are left to the browser.
	/// Everything else is [displayed](`Wui::display`) instead of navigated to.
	///
	/// # Errors
	///
	/// [`Error::NotAnAnchor`] iff the event didn't come from within an `<a>` element.
	pub fn navigate(&self, event: &Event) -> Result<(), Error> {
		let target = event.target().and_then(|target| target.dyn_into::<Element>().ok());
		let link = target.as_ref().and_then(|element| element.closest("a").ok().flatten());
		let link = match link {
			Some(link) => link,
			None => {
				error!("target: {:?}", target);
				return Err(Error::NotAnAnchor(target.map_or_else(|| "nothing".to_owned(), |element| format!("<{}>", element.tag_name()))));
			}
		};

		if link.has_attribute("target") {
			return Ok(());
		}
		let href = link.get_attribute("href").unwrap_or_default();
		if href.is_empty() || href.starts_with('#') {
			return Ok(());
		}

		event.prevent_default();
		let wui = self.clone();
		self.spawn(async move { wui.display(&href).await.map(drop) });
		Ok(())
	}

	/// Replaces the section element with `section.id` by a new one, after the currently selected sections have left.
	///
	/// Pushes a history entry and re-binds and re-marks the page's links.
	/// A section without `data` isn't renderable and is returned unchanged without touching the DOM.
	///
	/// # Errors
	///
	/// [`Error::NotInitialized`], [`Error::InvalidSection`] for a renderable section without id, and DOM failures.
	/// Exit animations that time out are reported through [`Wui::fail`] but don't stop the new section.
	pub async fn show(&self, section: Section) -> Result<Section, Error> {
		self.render(section, true).await
	}

	#[instrument(skip(self, section), fields(id = %section.id, path = %section.path))]
	async fn render(&self, section: Section, push: bool) -> Result<Section, Error> {
		if !section.is_renderable() {
			warn!("Not a section: {:?}", section);
			return Ok(section);
		}
		if section.id.is_empty() {
			return Err(Error::InvalidSection(format!("{} has no id", section.path)));
		}
		let dom = self.dom()?;
		let options = &self.0.options;
		let window = &self.0.window;
		let document = &self.0.document;
		info!("show #{} ({})", section.id, section.path);

		let leaving = navigation::selected_sections(document, &options.selected_class)?;
		for result in join_all(leaving.iter().map(|element| navigation::exit(window, element, options))).await {
			if let Err(error) = result {
				self.fail(&error);
			}
		}

		if let Some(existing) = document.get_element_by_id(&section.id) {
			debug!("refresh section DOM");
			existing.remove();
		}
		let element = document.create_element("section")?;
		element.set_id(&section.id);
		element.set_inner_html(section.html.as_deref().unwrap_or_default());
		if let Some(root) = section.root.as_deref().filter(|root| !root.is_empty()) {
			element.class_list().add_1(root)?;
		}
		dom.main.append_child(&element)?;

		if push {
			let state = JSON::parse(&serde_json::to_string(&section.history_state())?)?;
			window.history()?.push_state_with_url(&state, "", Some(section.location()))?;
		}
		self.0.sections.borrow_mut().insert(section.clone());

		navigation::enter(window, &element, options)?;
		self.bind_links();
		navigation::sync_selection(window, document, &options.selected_class)?;
		Ok(section)
	}

	/// Re-renders the section of a history entry (a `popstate` state) from the section store, without pushing a new entry.
	///
	/// A `null` state is ignored.
	///
	/// # Errors
	///
	/// [`Error::MissingSection`] iff the entry's section was never shown, and everything [`Wui::show`] fails with.
	pub async fn restore(&self, state: &JsValue) -> Result<Option<Section>, Error> {
		if state.is_null() || state.is_undefined() {
			return Ok(None);
		}
		let json = String::from(JSON::stringify(state)?);
		let entry: Section = serde_json::from_str(&json)?;
		let stored = self.0.sections.borrow().resolve(&entry).cloned();
		let stored = stored.ok_or_else(|| Error::MissingSection(entry.location().to_owned()))?;
		trace!("Restoring #{}", stored.id);
		self.render(stored, false).await.map(Some)
	}

	/// Sends `form` as JSON and handles the answer.
	///
	/// The form's controls are disabled while the request is in flight, and restored as soon as it settles (before any answer is shown).
	///
	/// # Errors
	///
	/// [`Error::GetForm`] for `GET` forms (before anything is sent), [`Error::FieldConflict`] for inconsistent field names,
	/// [`Error::AlreadyLoading`] while the same form is being sent, otherwise [`Error::LoadFailure`].
	#[instrument(skip(self, form, submitter))]
	pub async fn submit(&self, form: &HtmlFormElement, submitter: Option<&Element>) -> Result<(), Error> {
		let method = form.dataset().get("method").unwrap_or_else(|| form.method()).to_ascii_uppercase();
		let action = form.action();
		let name = Some(form.id()).filter(|id| !id.is_empty()).unwrap_or_else(|| action.clone());
		info!("Submit {} ({})", name, method);
		if method == "GET" {
			return Err(Error::GetForm(action));
		}

		let fields = form::collect(form, submitter);
		let payload = form::serialize(&fields)?;

		let controls = DisabledControls::new(form);
		let init = CustomEventInit::new();
		init.set_bubbles(true);
		init.set_detail(&JSON::parse(&payload.to_string())?);
		let announcement = CustomEvent::new_with_event_init_dict(SUBMIT_EVENT, &init)?;
		form.dispatch_event(&announcement)?;

		let key = format!("{}+{}", method, action);
		let wui = self.clone();
		let answered = form.clone();
		let context = format!("submit {}", name);
		let body = payload.to_string();
		let result = self
			.0
			.loads
			.track(&key, async move {
				let reply = wui.0.gateway.request(&action, RequestOptions::json(method, body), &context).await;
				drop(controls);
				wui.answer(&answered, reply?).await
			})
			.await;
		if !matches!(result, Err(Error::AlreadyLoading(_))) {
			self.0.loads.forget(&key);
		}
		result
	}

	async fn answer(&self, form: &HtmlFormElement, reply: Reply) -> Result<(), Error> {
		self.announce(reply.response());
		let response = match reply {
			Reply::Follow { location, .. } => {
				self.notify(Severity::Info, &format!("Created, will follow to {}", location));
				self.follow(location);
				return Ok(());
			}
			Reply::Content(response) => response,
		};
		if response.body.trim().is_empty() {
			debug!("Empty answer to #{}", form.id());
			return Ok(());
		}

		let json: Value = response.json()?;
		if let Some(error) = json.get("error") {
			let message = error.get("message").and_then(Value::as_str).unwrap_or("The form was rejected");
			error!("submit error: {}", error);
			self.notify(Severity::Error, message);
			return Ok(());
		}
		debug!("after-submit, show section");
		self.show(serde_json::from_value(json)?).await.map(drop)
	}

	/// Shows the out-of-band message header of `response`, if present.
	fn announce(&self, response: &Response) {
		if let Some(messages) = response.header(&self.0.options.messages_header).filter(|messages| !messages.is_empty()) {
			self.notify(Severity::Info, messages);
		}
	}

	fn follow(&self, location: String) {
		let window = self.0.window.clone();
		Timeout::new(self.0.options.follow_delay_ms, move || {
			if let Err(error) = window.location().set_href(&location) {
				error!("Failed to follow {}: {}", location, describe_js(&error));
			}
		})
		.forget();
	}
}
