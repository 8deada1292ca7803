#![doc(html_root_url = "https://docs.rs/wui/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod listener;
pub mod navigation;
pub mod notifier;
pub mod plugin;
pub mod registry;
pub mod section;
mod wui;

pub use config::Options;
pub use error::{Error, HttpError, Severity};
pub use http::{Gateway, Reply, RequestOptions, Response};
pub use notifier::Notifier;
pub use plugin::{PluginRegistry, View};
pub use registry::{Completion, LoadRegistry, LoadState};
pub use section::{Section, SectionData, SectionStore};
pub use wui::{Wui, SUBMIT_EVENT};

/// Routes `tracing` output to the browser console.
///
/// Call this at most once, before anything else logs.
#[cfg(feature = "console")]
pub fn install_console_tracing() {
	tracing_wasm::set_as_global_default();
}
