//! Client-level error types shared across the pipeline, credential stores, and auth helpers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential storage failure.
	#[error("{0}")]
	Credential(
		#[from]
		#[source]
		crate::credential::CredentialError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded into the requested shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Backend answered with a non-success status; passed through untouched.
	#[error(transparent)]
	Api(#[from] ApiError),

	/// The access token could not be renewed; the stored credential has been cleared.
	///
	/// Every request that waited on the same refresh observes the same shared error.
	#[error("Session expired: {0}")]
	SessionExpired(Arc<RefreshError>),
	/// The refresh driving this request was abandoned before it completed.
	#[error("Token refresh was interrupted before completing.")]
	RefreshInterrupted,
}
impl Error {
	/// Returns the HTTP status attached to the error, if the backend produced one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(err) => Some(err.status),
			Self::SessionExpired(err) => err.status(),
			_ => None,
		}
	}

	/// Returns `true` when the error ended the current session.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired(_))
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("API base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("API base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Base URL that failed validation.
		url: String,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the API base URL.")]
	InvalidPath {
		/// Offending request path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Login route must be an absolute client-side path.
	#[error("Login route must start with `/`: {route}.")]
	InvalidLoginRoute {
		/// Route that failed validation.
		route: String,
	},
	/// Credential lifetime must be positive.
	#[error("Credential lifetime must be positive.")]
	NonPositiveCredentialLifetime,
	/// Request timeout must be positive.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// Header value cannot be represented on the wire.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] ::http::header::InvalidHeaderValue),
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path that failed.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error raised for `path`.
	pub fn network(path: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

/// Response body decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body bytes were not valid JSON.
	#[error("Response from {path} is not valid JSON.")]
	Json {
		/// Request path whose response failed to parse.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// JSON did not match the requested type.
	#[error("Response from {path} does not match the expected shape.")]
	Shape {
		/// Request path whose response failed to decode.
		path: String,
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Non-success response returned by the backend.
#[derive(Clone, Debug, ThisError)]
#[error("API responded with HTTP {status}: {message}")]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Backend-supplied message, or the canonical status reason when absent.
	pub message: String,
	/// Field-level validation errors keyed by field name.
	pub errors: BTreeMap<String, Vec<String>>,
	/// Raw response body as received.
	pub body: JsonValue,
}
impl ApiError {
	/// Builds an error from a response status and its (possibly empty) JSON body.
	pub fn from_response(status: u16, body: JsonValue) -> Self {
		let message = body
			.get("message")
			.and_then(JsonValue::as_str)
			.map(str::to_owned)
			.unwrap_or_else(|| {
				::http::StatusCode::from_u16(status)
					.ok()
					.and_then(|code| code.canonical_reason())
					.unwrap_or("Unexpected response")
					.to_owned()
			});
		let errors = body
			.get("errors")
			.and_then(|value| {
				serde_json::from_value::<BTreeMap<String, Vec<String>>>(value.clone()).ok()
			})
			.unwrap_or_default();

		Self { status, message, errors, body }
	}

	/// Returns `true` for HTTP 401 responses.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}
}

/// Reasons a token refresh can fail. Every variant ends the session.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The refresh endpoint cannot be resolved against the base URL.
	#[error("Refresh endpoint URL is invalid.")]
	Endpoint(#[source] ConfigError),
	/// The refresh call never produced a response.
	#[error("Refresh endpoint could not be reached.")]
	Transport(#[source] TransportError),
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the session with HTTP {status}.")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Raw response body.
		body: JsonValue,
	},
	/// The refresh endpoint answered 2xx with a body that is not JSON.
	#[error("Refresh endpoint returned malformed JSON.")]
	MalformedResponse(#[source] serde_json::Error),
	/// The refresh response carried no usable access token.
	#[error("Refresh did not return an access_token.")]
	MissingAccessToken,
	/// The new token could not be persisted.
	#[error("Refreshed token could not be stored.")]
	Store(#[source] crate::credential::CredentialError),
}
impl RefreshError {
	/// Returns the HTTP status produced by the refresh endpoint, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			_ => None,
		}
	}
}
