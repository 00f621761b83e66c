//! Transport primitives for the API pipeline.
//!
//! The module exposes [`ApiTransport`] alongside the [`ApiRequest`] descriptor and the
//! [`RawResponse`] it produces, so downstream crates (and tests) can plug in custom HTTP stacks
//! while the client keeps ownership of authorization, envelope handling, and token refresh.
//! Transports never interpret status codes: a 401 is a successful round trip as far as they
//! are concerned.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use ::http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API requests.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by every
/// clone of a client, and the futures they return must be `Send` so pipelines can hop
/// executors. The refresh call goes through the same transport, but never through the
/// client's 401 recovery.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` to the already-resolved `url` and returns the raw response.
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a>;
}

/// Outgoing request descriptor flowing through the pipeline.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the API base URL, e.g. `/admin/products`.
	pub path: String,
	/// Query-string pairs appended to the URL.
	pub query: Vec<(String, String)>,
	/// Optional JSON body.
	pub body: Option<JsonValue>,
	/// Request headers. JSON content negotiation headers are preset.
	pub headers: HeaderMap,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request for `method` + `path` with JSON `Content-Type`/`Accept` headers.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		Self { method, path: path.into(), query: Vec::new(), body: None, headers, retried: false }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: JsonValue) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends query-string pairs.
	pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Returns `true` once the request has been replayed after a token refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Returns `true` when the request path contains `fragment`.
	pub fn targets(&self, fragment: &str) -> bool {
		self.path.contains(fragment)
	}

	/// Returns the bearer credential currently attached, if any.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}

	pub(crate) fn set_authorization(&mut self, value: HeaderValue) {
		self.headers.insert(AUTHORIZATION, value);
	}
}

/// Response exactly as the transport received it.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Builds a response from its parts.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Builds a response carrying `body` serialized as JSON.
	pub fn json(status: StatusCode, body: &JsonValue) -> Self {
		let mut response = Self::new(status, body.to_string());

		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Parses the body as JSON. Empty bodies parse as `null`.
	pub fn parse_json(&self) -> Result<JsonValue, serde_json::Error> {
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return Ok(JsonValue::Null);
		}

		serde_json::from_slice(&self.body)
	}

	/// Parses the body as JSON, falling back to a JSON string of the raw text.
	pub fn lossy_json(&self) -> JsonValue {
		self.parse_json()
			.unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&self.body).into_owned()))
	}
}

/// Normalized response handed back to callers.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
	/// HTTP status code of the final (possibly replayed) response.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Body with the backend envelope removed.
	pub data: JsonValue,
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The wrapped client keeps a cookie jar so the refresh endpoint sees the ambient session
/// cookie set during login.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a cookie-aware client honouring the configured timeout.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.timeout(config.timeout.unsigned_abs())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute<'a>(&'a self, url: Url, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let network = |e: ReqwestError| TransportError::network(request.path.clone(), e);
			let mut builder =
				self.0.request(request.method.clone(), url).headers(request.headers.clone());

			if !request.query.is_empty() {
				builder = builder.query(&request.query);
			}
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}

			let response = builder.send().await.map_err(network)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(network)?.to_vec();

			Ok(RawResponse { status, headers, body })
		})
	}
}
