//! Client configuration: API base URL, transport timeout, login route, and credential lifetime.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable consulted by [`ClientConfig::from_env`].
pub const BASE_URL_ENV: &str = "LEPASSAGE_API_BASE_URL";
/// Base URL used when [`BASE_URL_ENV`] is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
/// Client-side route the session-expired handler receives.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
/// Per-request transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);
/// Lifetime of the stored access-token cookie.
pub const DEFAULT_CREDENTIAL_LIFETIME: Duration = Duration::minutes(15);

/// Validated configuration shared by the transport, credential store, and pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// API root every request path is resolved against. Always ends with `/`.
	pub base_url: Url,
	/// Transport timeout applied to each request.
	pub timeout: Duration,
	/// Route handed to the session-expired handler after an unrecoverable refresh failure.
	pub login_route: String,
	/// Lifetime of a stored access token.
	pub credential_lifetime: Duration,
}
impl ClientConfig {
	/// Returns a builder seeded with the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Builds a config from [`BASE_URL_ENV`], falling back to [`DEFAULT_BASE_URL`].
	pub fn from_env() -> Result<Self, ConfigError> {
		let raw = env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());

		Self::parse(&raw)
	}

	/// Parses `raw` as the base URL and applies default settings.
	pub fn parse(raw: &str) -> Result<Self, ConfigError> {
		let base_url =
			Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Self::builder(base_url).build()
	}

	/// Returns `true` when the API is served over https, which marks credentials secure.
	pub fn is_secure(&self) -> bool {
		self.base_url.scheme() == "https"
	}

	/// Resolves a request path (with or without a leading `/`) against the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url.join(path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidPath { path: path.to_owned(), source }
		})
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// API root.
	pub base_url: Url,
	/// Transport timeout.
	pub timeout: Duration,
	/// Login route.
	pub login_route: String,
	/// Credential lifetime.
	pub credential_lifetime: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder with default timeout, login route, and credential lifetime.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			timeout: DEFAULT_TIMEOUT,
			login_route: DEFAULT_LOGIN_ROUTE.to_owned(),
			credential_lifetime: DEFAULT_CREDENTIAL_LIFETIME,
		}
	}

	/// Overrides the transport timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the login route.
	pub fn login_route(mut self, route: impl Into<String>) -> Self {
		self.login_route = route.into();

		self
	}

	/// Overrides the stored credential lifetime.
	pub fn credential_lifetime(mut self, lifetime: Duration) -> Self {
		self.credential_lifetime = lifetime;

		self
	}

	/// Validates and builds the config.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let Self { mut base_url, timeout, login_route, credential_lifetime } = self;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: base_url.to_string() });
		}
		if !login_route.starts_with('/') {
			return Err(ConfigError::InvalidLoginRoute { route: login_route });
		}
		if !timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}
		if !credential_lifetime.is_positive() {
			return Err(ConfigError::NonPositiveCredentialLifetime);
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		base_url.set_query(None);
		base_url.set_fragment(None);

		Ok(ClientConfig { base_url, timeout, login_route, credential_lifetime })
	}
}
