#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, Event, EventInit, HtmlAnchorElement};
use wui::{listener::Listener, navigation, Error, Wui};

use web_fixture_::{document, html_element, init_log, initialized, settle};

wasm_bindgen_test_configure!(run_in_browser);

fn anchor(href: &str) -> HtmlAnchorElement {
	let anchor: HtmlAnchorElement = html_element("a").unchecked_into();
	anchor.set_attribute("href", href).unwrap();
	anchor.set_text_content(Some(href));
	document().body().unwrap().append_child(&anchor).unwrap();
	anchor
}

/// Dispatches a cancelable event on `target` and has `wui` handle it as a click.
///
/// Returns the outcome and whether the default action was prevented.
fn navigate_from(wui: &Wui, target: &Element) -> (Result<(), Error>, bool) {
	let outcome = Rc::new(RefCell::new(None));
	let _listener = Listener::new(target.as_ref(), "wui-test-click", {
		let wui = wui.clone();
		let outcome = Rc::clone(&outcome);
		move |event: Event| {
			let result = wui.navigate(&event);
			*outcome.borrow_mut() = Some((result, event.default_prevented()));
		}
	})
	.unwrap();

	let init = EventInit::new();
	init.set_bubbles(true);
	init.set_cancelable(true);
	let event = Event::new_with_event_init_dict("wui-test-click", &init).unwrap();
	target.dispatch_event(&event).unwrap();
	let outcome = outcome.borrow_mut().take();
	outcome.unwrap()
}

#[wasm_bindgen_test]
async fn links_are_displayed_in_place() {
	let (wui, server) = initialized().await;
	server.reply(200, r#"{ "id": "elsewhere", "path": "/elsewhere", "html": "<p>here</p>", "data": {} }"#);
	let link = anchor("/elsewhere");
	let label = html_element("span");
	link.append_child(&label).unwrap();

	let (result, prevented) = navigate_from(&wui, &label);
	result.unwrap();
	assert!(prevented);

	settle().await;
	assert_eq!(server.sent().len(), 1);
	assert_eq!(server.sent()[0].url, "/elsewhere");
	assert!(document().get_element_by_id("elsewhere").is_some());
	assert!(link.class_list().contains("selected"));
}

#[wasm_bindgen_test]
async fn targeted_and_fragment_links_are_left_alone() {
	let (wui, server) = initialized().await;
	let blank = anchor("/blank");
	blank.set_target("_blank");
	let fragment = anchor("#top");
	let empty = anchor("");

	for link in [&blank, &fragment, &empty] {
		let (result, prevented) = navigate_from(&wui, link);
		result.unwrap();
		assert!(!prevented, "{:?}", link.get_attribute("href"));
	}
	settle().await;
	assert!(server.sent().is_empty());
}

#[wasm_bindgen_test]
async fn clicks_outside_anchors_fail() {
	let (wui, _) = initialized().await;
	let loose = html_element("div");
	document().body().unwrap().append_child(&loose).unwrap();

	let (result, prevented) = navigate_from(&wui, &loose);
	assert!(matches!(result, Err(Error::NotAnAnchor(ref tag)) if tag == "<DIV>"), "{:?}", result);
	assert!(!prevented);
}

#[wasm_bindgen_test]
async fn only_plain_unbound_links_are_bound() {
	let (_wui, _) = initialized().await;
	let plain = anchor("/plain-link");
	let targeted = anchor("/targeted-link");
	targeted.set_target("_self");
	let handled = anchor("/handled-link");
	let own = js_sys::Function::new_no_args("");
	handled.set_onclick(Some(&own));

	let bound = navigation::bind_links(&document(), &js_sys::Function::new_no_args(""));

	assert!(bound >= 1);
	assert!(plain.onclick().is_some());
	assert!(targeted.onclick().is_none());
	assert_eq!(handled.onclick(), Some(own));
}

#[wasm_bindgen_test]
async fn selection_follows_the_location() {
	let (wui, _) = initialized().await;
	let location = web_sys::window().unwrap().location();
	let here = anchor(&format!("{}{}", location.pathname().unwrap(), location.search().unwrap()));
	let there = anchor("/somewhere-else");

	navigation::sync_selection(&web_sys::window().unwrap(), &document(), &wui.options().selected_class).unwrap();

	assert!(here.class_list().contains(&wui.options().selected_class));
	assert!(!there.class_list().contains(&wui.options().selected_class));
}

#[wasm_bindgen_test]
async fn clicks_on_bound_links_are_intercepted() {
	let (wui, server) = initialized().await;
	server.reply(200, r#"{ "id": "clicked", "path": "/clicked", "html": "<p>clicked</p>", "data": {} }"#);
	let link = anchor("/clicked");
	assert!(wui.bind_links() >= 1);

	link.click();
	settle().await;

	assert_eq!(server.sent().len(), 1);
	assert_eq!(server.sent()[0].url, "/clicked");
	assert!(document().get_element_by_id("clicked").is_some());
}

#[wasm_bindgen_test]
async fn dropped_runtimes_release_their_links() {
	let (wui, _) = initialized().await;
	let link = anchor("/released");
	wui.bind_links();
	assert!(link.onclick().is_some());

	drop(wui);
	assert!(link.onclick().is_none());

	let (_wui, server) = initialized().await;
	server.reply(200, r#"{ "id": "rebound", "path": "/released", "html": "<p>rebound</p>", "data": {} }"#);
	assert!(link.onclick().is_some());
	link.click();
	settle().await;
	assert_eq!(server.sent().len(), 1);
	assert!(document().get_element_by_id("rebound").is_some());
}

#[wasm_bindgen_test]
async fn bootstrapped_runtimes_stay_installed() {
	init_log();
	let options = document().create_element("script").unwrap();
	options.set_attribute("type", "application/json").unwrap();
	options.set_id(wui::config::OPTIONS_ELEMENT_ID);
	options.set_text_content(Some(r#"{ "stylesheets": [], "notifierStylesheets": [] }"#));
	document().head().unwrap().append_child(&options).unwrap();

	{
		let wui = Wui::bootstrap(document()).await.unwrap();
		assert!(wui.is_initialized());
	}
	let link = anchor("/installed");
	let installed = Wui::installed().unwrap();
	installed.bind_links();
	drop(installed);
	assert!(link.onclick().is_some());

	drop(Wui::uninstall());
	assert!(Wui::installed().is_none());
	assert!(link.onclick().is_none());
	options.remove();
}
