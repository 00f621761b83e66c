//! Credential storage contracts and built-in stores for the bearer access token.
//!
//! The back office keeps exactly one access token at a time, modelled as a short-lived,
//! `SameSite=Strict` cookie. Stores hand back `None` once the cookie lifetime has elapsed,
//! so callers never see an expired token.

pub mod memory;
pub mod token;

pub use memory::MemoryCredentialStore;
pub use token::AccessToken;

// self
use crate::{_prelude::*, config::ClientConfig};

/// Name of the cookie holding the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Storage backend contract implemented by credential stores.
///
/// Exactly one credential is live per store: [`set`](CredentialStore::set) silently replaces
/// the previous value and [`clear`](CredentialStore::clear) is idempotent.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the live access token, or `None` when absent or expired.
	fn get(&self) -> Result<Option<AccessToken>, CredentialError>;

	/// Stores `token`, replacing any previous credential.
	fn set(&self, token: AccessToken) -> Result<(), CredentialError>;

	/// Removes the stored credential.
	fn clear(&self) -> Result<(), CredentialError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// `SameSite` attribute carried by the credential cookie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	/// Cookie is only sent on same-site requests.
	#[default]
	Strict,
	/// Cookie is sent on same-site requests and top-level navigations.
	Lax,
	/// Cookie is sent on every request.
	None,
}

/// Attributes applied to every credential a store issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookiePolicy {
	/// Time the credential stays readable after being stored.
	pub lifetime: Duration,
	/// Whether the cookie is restricted to https.
	pub secure: bool,
	/// `SameSite` attribute.
	pub same_site: SameSite,
}
impl CookiePolicy {
	/// Derives the policy from the client config: configured lifetime, secure when the API is
	/// served over https, `SameSite=Strict`.
	pub fn for_config(config: &ClientConfig) -> Self {
		Self {
			lifetime: config.credential_lifetime,
			secure: config.is_secure(),
			same_site: SameSite::Strict,
		}
	}

	/// Wraps `token` into a cookie issued at `now`.
	pub fn issue(&self, token: AccessToken, now: OffsetDateTime) -> CredentialCookie {
		CredentialCookie {
			name: ACCESS_TOKEN_COOKIE.to_owned(),
			token,
			expires_at: now + self.lifetime,
			secure: self.secure,
			same_site: self.same_site,
		}
	}
}
impl Default for CookiePolicy {
	fn default() -> Self {
		Self {
			lifetime: crate::config::DEFAULT_CREDENTIAL_LIFETIME,
			secure: false,
			same_site: SameSite::Strict,
		}
	}
}

/// Stored credential together with its cookie attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCookie {
	/// Cookie name, always [`ACCESS_TOKEN_COOKIE`].
	pub name: String,
	/// Bearer token value.
	pub token: AccessToken,
	/// Instant after which the cookie reads back as absent.
	pub expires_at: OffsetDateTime,
	/// Secure flag.
	pub secure: bool,
	/// `SameSite` attribute.
	pub same_site: SameSite,
}
impl CredentialCookie {
	/// Returns `true` while the cookie has not expired at `now`.
	pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}
