//! DOM side of section transitions: animation waits, link interception and the selection marker.

use crate::{error::describe_js, listener::next_event, Error, Options};
use futures::future::{self, Either};
use gloo_timers::future::TimeoutFuture;
use js_sys::Function;
use tracing::{debug, error, info, trace, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlAnchorElement, Window};

/// Whether `element` currently runs a CSS animation with a non-zero duration.
#[must_use]
pub fn is_animated(window: &Window, element: &Element) -> bool {
	let style = match window.get_computed_style(element) {
		Ok(Some(style)) => style,
		Ok(None) => return false,
		Err(error) => {
			warn!("Failed to read computed style: {}", describe_js(&error));
			return false;
		}
	};
	let name = style.get_property_value("animation-name").unwrap_or_default();
	let duration = style.get_property_value("animation-duration").unwrap_or_default();
	let named = name.split(',').any(|name| !matches!(name.trim(), "" | "none"));
	let lasts = duration.split(',').any(|duration| {
		let seconds = duration.trim();
		seconds.strip_suffix("ms").or_else(|| seconds.strip_suffix('s')).and_then(|value| value.parse::<f64>().ok()).map_or(false, |value| value > 0.)
	});
	named && lasts
}

/// Waits until `element`'s own animation ends, or for at most `timeout_ms`.
///
/// Returns immediately if the element isn't animated.
///
/// # Errors
///
/// [`Error::AnimationTimeout`] iff no `animationend` arrived in time.
pub async fn animation_end(window: &Window, element: &Element, timeout_ms: u32) -> Result<(), Error> {
	if !is_animated(window, element) {
		trace!("#{} isn't animated", element.id());
		return Ok(());
	}

	let own = element.clone();
	let ended = Box::pin(next_event(element.as_ref(), "animationend", move |event| {
		event.target().map_or(false, |target| {
			let own: &wasm_bindgen::JsValue = own.as_ref();
			let target: &wasm_bindgen::JsValue = target.as_ref();
			own == target
		})
	}));
	match future::select(ended, TimeoutFuture::new(timeout_ms)).await {
		Either::Left((ended, _)) => ended.map(drop),
		Either::Right(((), _)) => Err(Error::AnimationTimeout {
			id: element.id(),
			timeout_ms,
		}),
	}
}

/// Runs the exit transition of a previously selected section.
///
/// The leaving class is removed again whether or not the animation ended in time.
///
/// # Errors
///
/// See [`animation_end`].
pub async fn exit(window: &Window, element: &Element, options: &Options) -> Result<(), Error> {
	let classes = element.class_list();
	classes.remove_1(&options.selected_class)?;
	classes.add_1(&options.leaving_class)?;
	let ended = animation_end(window, element, options.exit_timeout_ms).await;
	classes.remove_1(&options.leaving_class)?;
	debug!("#{} left", element.id());
	ended
}

/// Marks a freshly inserted section as selected and lets its entry animation play.
///
/// # Errors
///
/// Iff the class list can't be updated.
pub fn enter(window: &Window, element: &Element, options: &Options) -> Result<(), Error> {
	element.class_list().add_2(&options.selected_class, &options.entering_class)?;

	let window = window.clone();
	let element = element.clone();
	let entering = options.entering_class.clone();
	let timeout_ms = options.exit_timeout_ms;
	wasm_bindgen_futures::spawn_local(async move {
		if let Err(error) = animation_end(&window, &element, timeout_ms).await {
			warn!("{}", error);
		}
		if let Err(error) = element.class_list().remove_1(&entering) {
			error!("Failed to remove {:?}: {}", entering, describe_js(&error));
		}
	});
	Ok(())
}

/// The sections currently carrying the selection marker.
///
/// # Errors
///
/// Iff `class` isn't usable in a selector.
pub fn selected_sections(document: &Document, class: &str) -> Result<Vec<Element>, Error> {
	let nodes = document.query_selector_all(&format!("section.{}", class))?;
	Ok((0..nodes.length()).filter_map(|i| nodes.item(i)).filter_map(|node| node.dyn_into::<Element>().ok()).collect())
}

fn anchors(document: &Document) -> impl Iterator<Item = HtmlAnchorElement> {
	let collection = document.get_elements_by_tag_name("a");
	(0..collection.length()).filter_map(move |i| collection.item(i)).filter_map(|element| element.dyn_into::<HtmlAnchorElement>().ok())
}

/// Routes clicks on every anchor that isn't bound yet to `handler`.
///
/// Anchors with a `target` attribute open another browsing context and are left alone.
pub fn bind_links(document: &Document, handler: &Function) -> usize {
	let mut bound = 0;
	for anchor in anchors(document) {
		if anchor.onclick().is_some() || anchor.has_attribute("target") {
			continue;
		}
		anchor.set_onclick(Some(handler));
		bound += 1;
	}
	if bound > 0 {
		info!("navigate bound for {} links", bound);
	}
	bound
}

/// Clears the click handler of every anchor bound to `handler`. Anchors bound to anything else are untouched.
pub fn unbind_links(document: &Document, handler: &Function) -> usize {
	let mut released = 0;
	for anchor in anchors(document) {
		if anchor.onclick().as_ref() == Some(handler) {
			anchor.set_onclick(None);
			released += 1;
		}
	}
	released
}

/// Whether an anchor's `href` (as written, or resolved) points at `location`.
#[must_use]
pub fn points_at(raw_href: &str, resolved_href: &str, location_href: &str, location_path: &str) -> bool {
	let strip_fragment = |href: &str| href.split('#').next().unwrap_or_default().to_owned();
	if raw_href.is_empty() || raw_href.starts_with('#') {
		return false;
	}
	raw_href == location_path || strip_fragment(resolved_href) == strip_fragment(location_href)
}

/// Puts the selection marker on exactly the anchors pointing at the current location.
///
/// # Errors
///
/// Iff the location can't be read.
pub fn sync_selection(window: &Window, document: &Document, class: &str) -> Result<usize, Error> {
	let location = window.location();
	let href = location.href()?;
	let path = format!("{}{}", location.pathname()?, location.search()?);

	let mut selected = 0;
	for anchor in anchors(document) {
		let raw = anchor.get_attribute("href").unwrap_or_default();
		let on = points_at(&raw, &anchor.href(), &href, &path);
		anchor.class_list().toggle_with_force(class, on)?;
		selected += usize::from(on);
	}
	trace!("{} link(s) selected", selected);
	Ok(selected)
}

#[cfg(test)]
mod tests {
	use super::points_at;

	#[test]
	fn anchors_match_by_raw_or_resolved_href() {
		let href = "http://localhost/a?x=1";
		let path = "/a?x=1";
		assert!(points_at("/a?x=1", "http://localhost/a?x=1", href, path));
		assert!(points_at("a?x=1", "http://localhost/a?x=1", href, path));
		assert!(points_at("/a?x=1#top", "http://localhost/a?x=1#top", href, path));
		assert!(!points_at("/a", "http://localhost/a", href, path));
		assert!(!points_at("#top", "http://localhost/a?x=1#top", href, path));
		assert!(!points_at("", "http://localhost/a?x=1", href, path));
	}
}
