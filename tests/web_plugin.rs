#![cfg(target_arch = "wasm32")]

use std::{cell::Cell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, HtmlElement};
use wui::{Error, Severity, View, Wui};

use web_fixture_::{document, html_element, initialized, messages, uninitialized};

wasm_bindgen_test_configure!(run_in_browser);

struct Panel {
	element: HtmlElement,
	readied: Cell<usize>,
}

impl Panel {
	fn new() -> Rc<Self> {
		Rc::new(Self {
			element: html_element("aside"),
			readied: Cell::new(0),
		})
	}
}

impl View for Panel {
	fn name(&self) -> &str {
		"Panel"
	}

	fn element(&self) -> &HtmlElement {
		&self.element
	}

	fn ready(&self, _wui: &Wui) -> Result<(), Error> {
		self.readied.set(self.readied.get() + 1);
		Ok(())
	}
}

#[wasm_bindgen_test]
async fn plugins_need_initialization() {
	let (wui, _) = uninitialized();
	let error = wui.plugin("early", Panel::new()).await.unwrap_err();
	assert!(matches!(error, Error::NotInitialized), "{:?}", error);
}

#[wasm_bindgen_test]
async fn plugin_ids_are_unique() {
	let (wui, _) = initialized().await;
	let first = Panel::new();
	wui.plugin("panel", first.clone()).await.unwrap();
	assert_eq!(first.element.id(), "panel");

	let second = Panel::new();
	let error = wui.plugin("panel", second.clone()).await.unwrap_err();
	assert!(matches!(error, Error::PluginExists(ref id) if id == "panel"), "{:?}", error);
	assert_eq!(second.element.id(), "");

	let attached = Panel::new();
	attached.element.set_id("elsewhere");
	let error = wui.plugin("attached", attached.clone()).await.unwrap_err();
	assert!(matches!(error, Error::PluginAttached { ref existing, .. } if existing == "elsewhere"), "{:?}", error);
	assert!(wui.plugin_view("attached").is_none());
}

#[wasm_bindgen_test]
async fn plugins_are_deployed_and_readied() {
	let (wui, _) = initialized().await;
	let sidebar = Panel::new();
	let footer = Panel::new();
	wui.plugins(vec![("sidebar".to_owned(), sidebar.clone() as Rc<dyn View>), ("footer".to_owned(), footer.clone() as Rc<dyn View>)])
		.await
		.unwrap();

	let body: Element = document().body().unwrap().into();
	for panel in [&sidebar, &footer] {
		assert_eq!(panel.readied.get(), 1);
		assert_eq!(panel.element.parent_element().unwrap(), body);
	}
	assert!(wui.plugin_view("footer").is_some());
}

#[wasm_bindgen_test]
async fn notifier_channels() {
	let (wui, _) = initialized().await;
	let notifier = wui.notifier().unwrap();
	assert_eq!(notifier.element().id(), "notify");

	let warning = notifier.message(Severity::Warn, "<b>careful</b>").unwrap().unwrap();
	assert!(warning.class_list().contains("message"));
	assert!(warning.class_list().contains("warn"));
	assert_eq!(warning.text_content().as_deref(), Some("<b>careful</b>"));
	assert_eq!(warning.child_element_count(), 0);

	let newer = notifier.message(Severity::Info, "newer").unwrap().unwrap();
	assert_eq!(notifier.element().first_element_child().unwrap(), newer);

	assert!(notifier.message(Severity::Log, "quiet").unwrap().is_none());
}

#[wasm_bindgen_test]
async fn clicking_a_message_dismisses_it() {
	let (wui, _) = initialized().await;
	let notifier = wui.notifier().unwrap();
	let message = notifier.message(Severity::Error, "click me").unwrap().unwrap();

	message.dyn_ref::<HtmlElement>().unwrap().click();
	assert!(message.class_list().contains(wui::notifier::DISAPPEAR_CLASS));
	web_fixture_::settle().await;
	assert!(!message.is_connected());
}

#[wasm_bindgen_test]
async fn deploying_text_and_templates() {
	let (wui, _) = initialized().await;
	let container: Element = html_element("div").into();
	wui.deploy_node(&container, None).unwrap();

	wui.deploy_text("<b>not markup</b>", Some(&container)).unwrap();
	assert_eq!(container.child_element_count(), 0);
	assert_eq!(container.text_content().as_deref(), Some("<b>not markup</b>"));

	let fragment = wui.template(&["<b>one</b>", "<i>two</i>"]).unwrap();
	assert_eq!(fragment.child_element_count(), 2);
	wui.deploy_node(&fragment, Some(&container)).unwrap();
	assert_eq!(container.child_element_count(), 2);
}

#[wasm_bindgen_test]
async fn linked_stylesheets_count_as_loaded() {
	let (wui, _) = initialized().await;
	let link = document().create_element("link").unwrap();
	link.set_attribute("rel", "stylesheet").unwrap();
	link.set_attribute("href", "/already-linked.css").unwrap();
	document().head().unwrap().append_child(&link).unwrap();

	wui.asset("/already-linked.css").await.unwrap();
	assert!(wui.loads().state("/already-linked.css").is_none());
	assert_eq!(document().query_selector_all(r#"link[href="/already-linked.css"]"#).unwrap().length(), 1);
}

#[wasm_bindgen_test]
async fn missing_stylesheets_fail_to_load() {
	let (wui, _) = initialized().await;
	let error = wui.assets(&["/no-such-stylesheet.css".to_owned()]).await.unwrap_err();

	assert!(matches!(error.cause(), Some(Error::Network(_))), "{:?}", error);
	assert!(wui.loads().has_failed("/no-such-stylesheet.css"));
	assert!(!wui.loads().is_loading());
	assert_eq!(document().query_selector_all(r#"link[href="/no-such-stylesheet.css"]"#).unwrap().length(), 0);

	// Asking again retries instead of reporting the failed link as loaded.
	let error = wui.asset("/no-such-stylesheet.css").await.unwrap_err();
	assert!(matches!(error, Error::LoadFailure { .. }), "{:?}", error);
	assert!(wui.loads().has_failed("/no-such-stylesheet.css"));
}

#[wasm_bindgen_test]
async fn loaded_stylesheets_are_linked_once() {
	let (wui, _) = initialized().await;
	let url = "data:text/css,.wui-test%7Bcolor:red%7D";

	wui.asset(url).await.unwrap();
	wui.asset(url).await.unwrap();

	assert!(wui.loads().has_loaded(url));
	assert_eq!(document().query_selector_all(&format!(r#"link[href="{}"]"#, url)).unwrap().length(), 1);
}

#[wasm_bindgen_test]
async fn notifier_shorthands_pick_their_channel() {
	let (wui, _) = initialized().await;
	let notifier = wui.notifier().unwrap();
	notifier.error("broken");
	notifier.warn("wobbly");
	notifier.info("fine");

	assert_eq!(messages(&wui, "error").first().map(String::as_str), Some("broken"));
	assert_eq!(messages(&wui, "warn").first().map(String::as_str), Some("wobbly"));
	assert_eq!(messages(&wui, "info").first().map(String::as_str), Some("fine"));
}

#[wasm_bindgen_test]
async fn dismissing_cancels_the_expiry() {
	let (wui, _) = initialized().await;
	let notifier = wui.notifier().unwrap();
	let before = notifier.pending();
	let message = notifier.message(Severity::Info, "short-lived").unwrap().unwrap();
	assert_eq!(notifier.pending(), before + 1);

	message.dyn_ref::<HtmlElement>().unwrap().click();
	web_fixture_::settle().await;

	assert!(!message.is_connected());
	assert_eq!(notifier.pending(), before);
}
