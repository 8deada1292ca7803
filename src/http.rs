//! Outbound requests with a single place for deciding what a response means.
//!
//! The [`Gateway`] fills in same-origin defaults, sends through a [`Transport`] and then hands the raw
//! [`Response`] to a [`ResponseClassifier`], which turns it into a [`Reply`] or an [`Error`].

use crate::{Error, HttpError};
use futures::future::LocalBoxFuture;
use gloo_net::http::{Method, RequestBuilder};
use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};
use web_sys::{RequestCache, RequestCredentials, RequestMode};

/// Options of a single request. The defaults describe a same-origin `GET` that accepts JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
	pub method: String,
	/// Extra headers. These override the defaults.
	pub headers: Vec<(String, String)>,
	pub body: Option<String>,
	/// Bypass the HTTP cache.
	pub reload: bool,
}

impl Default for RequestOptions {
	fn default() -> Self {
		Self {
			method: "GET".to_owned(),
			headers: Vec::new(),
			body: None,
			reload: false,
		}
	}
}

impl RequestOptions {
	/// A request sending `body` as JSON.
	#[must_use]
	pub fn json(method: impl Into<String>, body: String) -> Self {
		Self {
			method: method.into(),
			headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
			body: Some(body),
			reload: true,
		}
	}
}

/// A fully specified outbound request, as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub url: String,
	pub method: String,
	pub headers: Vec<(String, String)>,
	pub body: Option<String>,
	pub same_origin: bool,
	pub reload: bool,
}

impl Request {
	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().rev().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
	}
}

/// A response with its body already read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
	pub status: u16,
	pub status_text: String,
	/// Final URL, after redirects.
	pub url: String,
	pub redirected: bool,
	/// Header names are lowercase.
	pub headers: HashMap<String, String>,
	pub body: String,
}

impl Response {
	#[must_use]
	pub fn ok(&self) -> bool {
		(200..300).contains(&self.status)
	}

	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// The `Location` header, read as a hint to follow.
	#[must_use]
	pub fn follow(&self) -> Option<&str> {
		self.header("location").filter(|location| !location.is_empty())
	}

	/// # Errors
	///
	/// Iff the body isn't valid JSON for `T`.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
		Ok(serde_json::from_str(&self.body)?)
	}

	#[must_use]
	pub fn http_error(&self) -> HttpError {
		HttpError {
			status_code: self.status,
			status_text: self.status_text.clone(),
			origin: self.url.clone(),
			redirected: self.redirected,
		}
	}
}

/// What a classified response asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// Use the response.
	Content(Response),
	/// Go to `location`.
	Follow { location: String, response: Response },
}

impl Reply {
	#[must_use]
	pub fn response(&self) -> &Response {
		match self {
			Self::Content(response) | Self::Follow { response, .. } => response,
		}
	}
}

/// Decides whether a response is a success, a redirect hint or a failure.
pub trait ResponseClassifier {
	/// `context` names the caller, for example `"display"` or `"submit #form"`.
	///
	/// # Errors
	///
	/// Iff the response counts as a failure.
	fn classify(&self, response: Response, context: &str) -> Result<Reply, Error>;
}

/// The default policy: `>=400` fails with an [`HttpError`], `201` and `3xx` with a `Location` header ask to follow it,
/// and everything else is content.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl ResponseClassifier for StatusClassifier {
	fn classify(&self, response: Response, context: &str) -> Result<Reply, Error> {
		if response.status >= 400 {
			return Err(response.http_error().into());
		}
		match (response.status, response.follow()) {
			(201 | 300..=399, Some(location)) => {
				let location = location.to_owned();
				debug!("{}: {} asks to follow {}", context, response.status, location);
				Ok(Reply::Follow { location, response })
			}
			_ => Ok(Reply::Content(response)),
		}
	}
}

pub trait Transport {
	fn send(&self, request: Request) -> LocalBoxFuture<'_, Result<Response, Error>>;
}

/// Sends requests through the browser's `fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

impl Transport for FetchTransport {
	fn send(&self, request: Request) -> LocalBoxFuture<'_, Result<Response, Error>> {
		Box::pin(async move {
			let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| Error::Network(format!("invalid method {:?}", request.method)))?;
			let mut builder = RequestBuilder::new(&request.url).method(method);
			if request.same_origin {
				builder = builder.mode(RequestMode::SameOrigin).credentials(RequestCredentials::SameOrigin);
			}
			if request.reload {
				builder = builder.cache(RequestCache::Reload);
			}
			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			let outbound = match request.body {
				Some(body) => builder.body(body)?,
				None => builder.build()?,
			};

			let response = outbound.send().await?;
			let headers = response.headers().entries().map(|(name, value)| (name.to_ascii_lowercase(), value)).collect();
			Ok(Response {
				status: response.status(),
				status_text: response.status_text(),
				url: response.url(),
				redirected: response.redirected(),
				headers,
				body: response.text().await?,
			})
		})
	}
}

pub struct Gateway {
	transport: Box<dyn Transport>,
	classifier: Box<dyn ResponseClassifier>,
}

impl Default for Gateway {
	fn default() -> Self {
		Self::new(FetchTransport)
	}
}

impl core::fmt::Debug for Gateway {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Gateway").finish_non_exhaustive()
	}
}

impl Gateway {
	#[must_use]
	pub fn new(transport: impl Transport + 'static) -> Self {
		Self {
			transport: Box::new(transport),
			classifier: Box::new(StatusClassifier),
		}
	}

	#[must_use]
	pub fn with_classifier(mut self, classifier: impl ResponseClassifier + 'static) -> Self {
		self.classifier = Box::new(classifier);
		self
	}

	/// Sends a same-origin request that accepts JSON and classifies its response.
	///
	/// # Errors
	///
	/// Transport failures, and whatever the [`ResponseClassifier`] rejects.
	#[instrument(skip(self, options), fields(method = %options.method))]
	pub async fn request(&self, url: &str, options: RequestOptions, context: &str) -> Result<Reply, Error> {
		let mut headers = vec![("Accept".to_owned(), "application/json".to_owned())];
		headers.extend(options.headers);
		let request = Request {
			url: url.to_owned(),
			method: options.method.to_ascii_uppercase(),
			headers,
			body: options.body,
			same_origin: true,
			reload: options.reload,
		};

		let response = self.transport.send(request).await?;
		trace!("{} {} -> {} {}", context, url, response.status, response.status_text);
		self.classifier.classify(response, context)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::cell::RefCell;
	use futures::executor::block_on;
	use std::rc::Rc;

	#[derive(Clone, Default)]
	struct Canned {
		sent: Rc<RefCell<Vec<Request>>>,
		response: Response,
	}
	impl Transport for Canned {
		fn send(&self, request: Request) -> LocalBoxFuture<'_, Result<Response, Error>> {
			self.sent.borrow_mut().push(request);
			let response = self.response.clone();
			Box::pin(async move { Ok(response) })
		}
	}

	fn status(status: u16, text: &str) -> Response {
		Response {
			status,
			status_text: text.to_owned(),
			url: "http://localhost/x".to_owned(),
			..Response::default()
		}
	}

	#[test]
	fn defaults_to_same_origin_json() {
		let transport = Canned {
			response: status(200, "OK"),
			..Canned::default()
		};
		let gateway = Gateway::new(transport.clone());

		block_on(gateway.request("/x", RequestOptions::json("post", "{}".to_owned()), "test")).unwrap();

		let sent = transport.sent.borrow();
		let request = &sent[0];
		assert_eq!(request.method, "POST");
		assert!(request.same_origin);
		assert!(request.reload);
		assert_eq!(request.header("accept"), Some("application/json"));
		assert_eq!(request.header("Content-Type"), Some("application/json"));
		assert_eq!(request.body.as_deref(), Some("{}"));
	}

	#[test]
	fn not_found_is_a_warning_http_error() {
		let gateway = Gateway::new(Canned {
			response: status(404, "Not Found"),
			..Canned::default()
		});

		match block_on(gateway.request("/x", RequestOptions::default(), "test")) {
			Err(Error::Http(error)) => {
				assert_eq!(error.status_code, 404);
				assert_eq!(error.status_text, "Not Found");
				assert_eq!(error.origin, "http://localhost/x");
				assert_eq!(error.severity(), crate::Severity::Warn);
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn created_with_location_is_followed() {
		let mut created = status(201, "Created");
		created.headers.insert("location".to_owned(), "/items/7".to_owned());

		match StatusClassifier.classify(created, "test").unwrap() {
			Reply::Follow { location, response } => {
				assert_eq!(location, "/items/7");
				assert_eq!(response.status, 201);
			}
			other => panic!("unexpected {:?}", other),
		}

		assert!(matches!(StatusClassifier.classify(status(201, "Created"), "test"), Ok(Reply::Content(_))));
		assert!(matches!(StatusClassifier.classify(status(304, "Not Modified"), "test"), Ok(Reply::Content(_))));
	}

	#[test]
	fn custom_classifier_decides() {
		struct Strict;
		impl ResponseClassifier for Strict {
			fn classify(&self, response: Response, _: &str) -> Result<Reply, Error> {
				if response.ok() {
					Ok(Reply::Content(response))
				} else {
					Err(response.http_error().into())
				}
			}
		}

		let gateway = Gateway::new(Canned {
			response: status(302, "Found"),
			..Canned::default()
		})
		.with_classifier(Strict);
		let error = block_on(gateway.request("/x", RequestOptions::default(), "test")).unwrap_err();
		assert_eq!(error.code(), "EWUI_HTTP_FAILURE");
	}

	#[test]
	fn response_headers_and_json() {
		let mut response = status(200, "OK");
		response.headers.insert("x-wui-messages".to_owned(), "Saved".to_owned());
		response.body = r#"{"id": "s1"}"#.to_owned();

		assert_eq!(response.header("X-WUI-Messages"), Some("Saved"));
		let section: crate::Section = response.json().unwrap();
		assert_eq!(section.id, "s1");
		assert!(response.follow().is_none());
	}
}
