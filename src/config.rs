use crate::Error;
use serde::Deserialize;
use tracing::{debug, instrument};
use web_sys::Document;

/// Id of the `<script type="application/json">` element [`Options::from_document`] reads.
pub const OPTIONS_ELEMENT_ID: &str = "wui-options";

/// Runtime configuration of a [`Wui`](`crate::Wui`).
///
/// Every field has a default, so a partial JSON object is enough to override single values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
	/// Marks the links and the section matching the current location.
	pub selected_class: String,
	/// Set on `<body>` while any resource is loading.
	pub loading_class: String,
	/// Set on a section while its exit animation runs.
	pub leaving_class: String,
	/// Set on a section while its entry animation runs.
	pub entering_class: String,
	/// Container sections are inserted into. Created as `<main>` if missing.
	pub main_selector: String,
	/// Prefix for relative stylesheet names.
	pub asset_root: String,
	pub stylesheets: Vec<String>,
	pub notifier_stylesheets: Vec<String>,
	/// Delay before the loading class is removed, so that back-to-back loads don't flicker.
	pub loading_debounce_ms: u32,
	pub exit_timeout_ms: u32,
	pub message_timeout_ms: u32,
	/// Delay before following a `Location` hint of a form response.
	pub follow_delay_ms: u32,
	/// Response header that may carry out-of-band message text.
	pub messages_header: String,
	pub inject_viewport: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			selected_class: "selected".to_owned(),
			loading_class: "loading".to_owned(),
			leaving_class: "leaving".to_owned(),
			entering_class: "entering".to_owned(),
			main_selector: "main".to_owned(),
			asset_root: "/node_modules/wui".to_owned(),
			stylesheets: vec!["fluid-typography.css".to_owned(), "wui.css".to_owned()],
			notifier_stylesheets: vec!["Notifier.css".to_owned()],
			loading_debounce_ms: 100,
			exit_timeout_ms: 10_000,
			message_timeout_ms: 10_000,
			follow_delay_ms: 2000,
			messages_header: "X-WUI-Messages".to_owned(),
			inject_viewport: true,
		}
	}
}

impl Options {
	/// Reads overrides from `<script type="application/json" id="wui-options">`, if the document has one.
	///
	/// # Errors
	///
	/// Iff the element exists but doesn't contain a valid options object.
	#[instrument(skip(document))]
	pub fn from_document(document: &Document) -> Result<Self, Error> {
		match document.get_element_by_id(OPTIONS_ELEMENT_ID) {
			Some(element) => {
				let json = element.text_content().unwrap_or_default();
				debug!("Reading options from #{}", OPTIONS_ELEMENT_ID);
				Self::from_json(&json)
			}
			None => Ok(Self::default()),
		}
	}

	/// # Errors
	///
	/// Iff `json` isn't an options object.
	pub fn from_json(json: &str) -> Result<Self, Error> {
		Ok(serde_json::from_str(json)?)
	}

	/// Resolves a stylesheet name against [`asset_root`](`Options::asset_root`).
	///
	/// Absolute paths and URLs are returned unchanged.
	#[must_use]
	pub fn resolve_asset(&self, name: &str) -> String {
		if name.starts_with('/') || name.contains("://") {
			name.to_owned()
		} else {
			format!("{}/{}", self.asset_root.trim_end_matches('/'), name)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let options = Options::from_json(r#"{"exitTimeoutMs": 250, "stylesheets": []}"#).unwrap();
		assert_eq!(options.exit_timeout_ms, 250);
		assert!(options.stylesheets.is_empty());
		assert_eq!(options.selected_class, "selected");
		assert_eq!(options.message_timeout_ms, 10_000);
	}

	#[test]
	fn exit_animations_time_out_after_ten_seconds() {
		assert_eq!(Options::default().exit_timeout_ms, 10_000);
	}

	#[test]
	fn rejects_non_objects() {
		assert_eq!(Options::from_json("[1, 2]").unwrap_err().code(), "EWUI_JSON");
	}

	#[test]
	fn asset_resolution() {
		let options = Options::default();
		assert_eq!(options.resolve_asset("wui.css"), "/node_modules/wui/wui.css");
		assert_eq!(options.resolve_asset("/static/a.css"), "/static/a.css");
		assert_eq!(options.resolve_asset("https://cdn.example/a.css"), "https://cdn.example/a.css");
	}
}
