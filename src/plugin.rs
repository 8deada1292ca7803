//! Views that attach once to a [`Wui`] under a short id.

use crate::{Error, Wui};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;
use web_sys::HtmlElement;

/// A view owning a single DOM element.
pub trait View {
	/// Name used in log messages.
	fn name(&self) -> &str;

	fn element(&self) -> &HtmlElement;

	/// Stylesheets that have to be loaded before the view is usable.
	fn styles(&self) -> &[String] {
		&[]
	}

	/// Called after the element was deployed into the document.
	///
	/// # Errors
	///
	/// Implementation-defined.
	fn ready(&self, _wui: &Wui) -> Result<(), Error> {
		Ok(())
	}
}

/// Id-to-view table. Registrations are permanent.
#[derive(Default)]
pub struct PluginRegistry {
	views: HashMap<String, Rc<dyn View>>,
}

impl core::fmt::Debug for PluginRegistry {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_set().entries(self.views.keys()).finish()
	}
}

impl PluginRegistry {
	/// Registers `view` as `id` and makes `id` its element's DOM id.
	///
	/// # Errors
	///
	/// - [`Error::PluginExists`] iff `id` is taken,
	/// - [`Error::PluginAttached`] iff the view's element already has an id.
	///
	/// Nothing is changed in either case.
	pub fn register(&mut self, id: &str, view: Rc<dyn View>) -> Result<(), Error> {
		if self.views.contains_key(id) {
			return Err(Error::PluginExists(id.to_owned()));
		}
		let existing = view.element().id();
		if !existing.is_empty() {
			return Err(Error::PluginAttached {
				id: id.to_owned(),
				existing,
			});
		}

		view.element().set_id(id);
		trace!("{} is now #{}", view.name(), id);
		self.views.insert(id.to_owned(), view);
		Ok(())
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<Rc<dyn View>> {
		self.views.get(id).cloned()
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.views.keys().map(String::as_str)
	}
}
