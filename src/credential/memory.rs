//! Thread-safe in-memory [`CredentialStore`] implementation for tests and embedded sessions.

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	credential::{AccessToken, CookiePolicy, CredentialCookie, CredentialError, CredentialStore},
};

type CookieSlot = Arc<RwLock<Option<CredentialCookie>>>;

/// Thread-safe credential store that keeps the cookie in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
	policy: CookiePolicy,
	slot: CookieSlot,
}
impl MemoryCredentialStore {
	/// Creates an empty store issuing cookies under `policy`.
	pub fn new(policy: CookiePolicy) -> Self {
		Self { policy, slot: Default::default() }
	}

	/// Creates an empty store whose policy is derived from `config`.
	pub fn for_config(config: &ClientConfig) -> Self {
		Self::new(CookiePolicy::for_config(config))
	}

	/// Returns the stored cookie, including expired ones, for inspection.
	pub fn cookie(&self) -> Option<CredentialCookie> {
		self.slot.read().clone()
	}

	/// Replaces the stored cookie verbatim, bypassing the policy.
	pub fn store_cookie(&self, cookie: CredentialCookie) {
		*self.slot.write() = Some(cookie);
	}

	fn get_at(slot: &CookieSlot, now: OffsetDateTime) -> Option<AccessToken> {
		let mut guard = slot.write();

		match guard.as_ref() {
			Some(cookie) if cookie.is_live_at(now) => Some(cookie.token.clone()),
			Some(_) => {
				*guard = None;

				None
			},
			None => None,
		}
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn get(&self) -> Result<Option<AccessToken>, CredentialError> {
		Ok(Self::get_at(&self.slot, OffsetDateTime::now_utc()))
	}

	fn set(&self, token: AccessToken) -> Result<(), CredentialError> {
		let cookie = self.policy.issue(token, OffsetDateTime::now_utc());

		*self.slot.write() = Some(cookie);

		Ok(())
	}

	fn clear(&self) -> Result<(), CredentialError> {
		self.slot.write().take();

		Ok(())
	}
}
