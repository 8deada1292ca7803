//! Failure taxonomy shared by every part of the runtime.
//!
//! Each [`Error`] carries a stable [code](`Error::code`) so that the top-level
//! failure handler ([`Wui::fail`](`crate::Wui::fail`)) can decide how to surface it.

use core::fmt::{self, Display};
use std::sync::Arc;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Notification channel derived from an error kind or an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
	/// Only logged, never shown.
	Log,
	Info,
	Warn,
	Error,
}

impl Severity {
	/// Buckets an HTTP status code: `>499` is an error, `>399` a warning, `>299` informational and anything lower is only logged.
	///
	/// This only picks a channel. Whether a response counts as a failure is decided by the [`ResponseClassifier`](`crate::http::ResponseClassifier`).
	#[must_use]
	pub fn for_status(status: u16) -> Self {
		match status {
			500.. => Self::Error,
			400..=499 => Self::Warn,
			300..=399 => Self::Info,
			_ => Self::Log,
		}
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Log => "log",
			Self::Info => "info",
			Self::Warn => "warn",
			Self::Error => "error",
		}
	}
}

/// A non-success answer from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
	pub status_code: u16,
	pub status_text: String,
	/// URL of the response, after redirects.
	pub origin: String,
	pub redirected: bool,
}

impl std::error::Error for HttpError {}
impl Display for HttpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let motto = if self.status_code >= 500 { "Server Failure" } else { "Request Failure" };
		write!(f, "HTTP {} {}: {}", self.status_code, motto, self.status_text)
	}
}

impl HttpError {
	#[must_use]
	pub fn severity(&self) -> Severity {
		Severity::for_status(self.status_code)
	}
}

#[derive(Debug, Clone, Error)]
pub enum Error {
	/// An asynchronous resource (stylesheet, JSON section, form round trip) failed to complete.
	#[error("resource {url} failed to load")]
	LoadFailure {
		url: String,
		#[source]
		cause: Arc<Error>,
	},

	#[error(transparent)]
	Http(#[from] HttpError),

	#[error("Already loading {0:?}")]
	AlreadyLoading(String),

	#[error("finish callback called twice for {0:?}")]
	CompletedTwice(String),

	/// Every completion handle for a pending load was dropped without finishing it.
	#[error("load of {0:?} was abandoned")]
	Abandoned(String),

	#[error("wui is not initialized")]
	NotInitialized,

	#[error("plugin {0:?} already exists")]
	PluginExists(String),

	#[error("view for plugin {id:?} is already attached as #{existing}")]
	PluginAttached { id: String, existing: String },

	#[error("navigation expects an <A> element as event target, found {0}")]
	NotAnAnchor(String),

	#[error("can't send a GET form ({0})")]
	GetForm(String),

	#[error("exit animation of #{id} did not end within {timeout_ms}ms")]
	AnimationTimeout { id: String, timeout_ms: u32 },

	#[error("no stored section for {0:?}")]
	MissingSection(String),

	#[error("invalid section: {0}")]
	InvalidSection(String),

	#[error("form field {0:?} conflicts with another field's structure")]
	FieldConflict(String),

	#[error("invalid JSON: {0}")]
	Json(String),

	#[error("network failure: {0}")]
	Network(String),

	#[error("{0}")]
	Js(String),
}

impl Error {
	/// Stable identifier of the error kind.
	#[must_use]
	pub fn code(&self) -> &'static str {
		match self {
			Self::LoadFailure { .. } => "EWUI_LOAD_FAILURE",
			Self::Http(_) => "EWUI_HTTP_FAILURE",
			Self::AlreadyLoading(_) => "EWUI_ALREADY_LOADING",
			Self::CompletedTwice(_) => "EWUI_COMPLETED_TWICE",
			Self::Abandoned(_) => "EWUI_ABANDONED",
			Self::NotInitialized => "EWUI_NOT_INITIALIZED",
			Self::PluginExists(_) => "EWUI_PLUGIN_EXISTS",
			Self::PluginAttached { .. } => "EWUI_PLUGIN_ATTACHED",
			Self::NotAnAnchor(_) => "EWUI_NOT_AN_ANCHOR",
			Self::GetForm(_) => "EWUI_GET_FORM",
			Self::AnimationTimeout { .. } => "EWUI_ANIMATION_TIMEOUT",
			Self::MissingSection(_) => "EWUI_MISSING_SECTION",
			Self::InvalidSection(_) => "EWUI_INVALID_SECTION",
			Self::FieldConflict(_) => "EWUI_FIELD_CONFLICT",
			Self::Json(_) => "EWUI_JSON",
			Self::Network(_) => "EWUI_NETWORK",
			Self::Js(_) => "EWUI_JS",
		}
	}

	/// Wraps `cause` as the failure of the resource at `url`.
	#[must_use]
	pub fn load_failure(url: impl Into<String>, cause: Error) -> Self {
		Self::LoadFailure {
			url: url.into(),
			cause: Arc::new(cause),
		}
	}

	/// The wrapped cause of a [`Error::LoadFailure`].
	#[must_use]
	pub fn cause(&self) -> Option<&Error> {
		match self {
			Self::LoadFailure { cause, .. } => Some(cause),
			_ => None,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Self::Json(error.to_string())
	}
}

impl From<gloo_net::Error> for Error {
	fn from(error: gloo_net::Error) -> Self {
		Self::Network(error.to_string())
	}
}

impl From<JsValue> for Error {
	fn from(value: JsValue) -> Self {
		Self::Js(describe_js(&value))
	}
}

/// Best-effort human readable rendition of a thrown JavaScript value.
pub(crate) fn describe_js(value: &JsValue) -> String {
	if let Some(error) = value.dyn_ref::<js_sys::Error>() {
		return String::from(error.message());
	}
	value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
