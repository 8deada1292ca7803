//! Server-delivered page fragments and the store that remembers them for history navigation.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A navigable page fragment as received from the server.
///
/// Only sections with [`data`](`Section::data`) are renderable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Section {
	/// DOM id of the `<section>` element.
	#[serde(default)]
	pub id: String,
	/// Canonical route.
	#[serde(default)]
	pub path: String,
	/// Fragment markup. Absent in history entries.
	#[serde(default)]
	pub html: Option<String>,
	#[serde(default)]
	pub data: Option<SectionData>,
	/// Additional CSS class of the section element.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionData {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

impl Section {
	#[must_use]
	pub fn is_renderable(&self) -> bool {
		self.data.is_some()
	}

	/// The address shown in the location bar: `data.url`, falling back to [`path`](`Section::path`).
	#[must_use]
	pub fn location(&self) -> &str {
		self.data.as_ref().and_then(|data| data.url.as_deref()).unwrap_or(&self.path)
	}

	/// The value persisted with the history entry: markup and any data beside the URL are dropped.
	#[must_use]
	pub fn history_state(&self) -> Section {
		Section {
			id: self.id.clone(),
			path: self.path.clone(),
			html: None,
			data: self.data.as_ref().map(|data| SectionData {
				url: data.url.clone(),
				rest: Map::new(),
			}),
			root: self.root.clone(),
		}
	}
}

/// Every section shown so far, addressable by id and by route.
#[derive(Debug, Default)]
pub struct SectionStore {
	by_id: HashMap<String, Section>,
	id_by_location: HashMap<String, String>,
}

impl SectionStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `section`, replacing any section with the same id.
	pub fn insert(&mut self, section: Section) -> Option<Section> {
		let replaced = self.by_id.remove(&section.id);
		if let Some(replaced) = &replaced {
			self.unindex(replaced);
		}
		self.id_by_location.insert(section.path.clone(), section.id.clone());
		if section.location() != section.path {
			self.id_by_location.insert(section.location().to_owned(), section.id.clone());
		}
		self.by_id.insert(section.id.clone(), section);
		replaced
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<&Section> {
		self.by_id.get(id)
	}

	/// Looks a section up by the target of a navigation: its route or its `data.url`.
	#[must_use]
	pub fn find(&self, target: &str) -> Option<&Section> {
		self.id_by_location.get(target).and_then(|id| self.by_id.get(id))
	}

	/// Finds the stored counterpart of a history entry: by id first, then by its location.
	#[must_use]
	pub fn resolve(&self, entry: &Section) -> Option<&Section> {
		self.get(&entry.id).or_else(|| self.find(entry.location()))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}

	fn unindex(&mut self, section: &Section) {
		for location in [section.path.as_str(), section.location()] {
			if self.id_by_location.get(location) == Some(&section.id) {
				self.id_by_location.remove(location);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn section(id: &str, path: &str, url: &str) -> Section {
		serde_json::from_value(json!({
			"id": id,
			"path": path,
			"html": "<p>x</p>",
			"data": { "url": url, "title": "X" },
		}))
		.unwrap()
	}

	#[test]
	fn data_is_required_for_rendering() {
		let section: Section = serde_json::from_str(r#"{"error": {"message": "nope"}}"#).unwrap();
		assert!(!section.is_renderable());
		assert!(section.id.is_empty());
	}

	#[test]
	fn history_state_strips_markup() {
		let section = section("s1", "/a", "/a?page=2");
		let state = serde_json::to_value(section.history_state()).unwrap();
		assert_eq!(
			state,
			json!({
				"id": "s1",
				"path": "/a",
				"html": null,
				"data": { "url": "/a?page=2" },
			})
		);
		assert_eq!(section.location(), "/a?page=2");
	}

	#[test]
	fn location_falls_back_to_path() {
		let section: Section = serde_json::from_value(json!({ "id": "s", "path": "/p", "data": {} })).unwrap();
		assert_eq!(section.location(), "/p");
	}

	#[test]
	fn store_lookup() {
		let mut store = SectionStore::new();
		assert!(store.insert(section("s1", "/a", "/a?x")).is_none());
		store.insert(section("s2", "/b", "/b"));

		assert_eq!(store.find("/a").map(|s| s.id.as_str()), Some("s1"));
		assert_eq!(store.find("/a?x").map(|s| s.id.as_str()), Some("s1"));
		assert_eq!(store.find("/b").map(|s| s.id.as_str()), Some("s2"));
		assert!(store.find("/c").is_none());

		let replaced = store.insert(section("s1", "/c", "/c"));
		assert_eq!(replaced.map(|s| s.path), Some("/a".to_owned()));
		assert!(store.find("/a").is_none());
		assert_eq!(store.find("/c").map(|s| s.id.as_str()), Some("s1"));
		assert_eq!(store.len(), 2);
	}

	#[test]
	fn history_entries_resolve_to_stored_markup() {
		let mut store = SectionStore::new();
		let shown = section("s1", "/a", "/a");
		store.insert(shown.clone());

		assert_eq!(store.resolve(&shown.history_state()), Some(&shown));

		let moved = Section {
			id: "gone".to_owned(),
			..shown.history_state()
		};
		assert_eq!(store.resolve(&moved), Some(&shown));
	}
}
