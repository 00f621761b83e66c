//! Auth endpoint helpers: login, logout, current user, and session restore.
//!
//! Login stores the returned access token; logout always clears it, even when the server call
//! fails. Neither the login nor the refresh endpoint ever triggers 401 recovery.

// self
use crate::{
	_prelude::*,
	client::ApiClient,
	credential::AccessToken,
	endpoints,
	http::{ApiRequest, ApiTransport},
	obs::{self, Stage},
};

/// Credentials posted to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
	/// Account email.
	pub email: String,
	/// Account password; redacted from `Debug`.
	pub password: String,
}
impl LoginCredentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Authenticated back-office user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
	/// User identifier.
	pub id: u64,
	/// Display name.
	pub name: String,
	/// Email address.
	pub email: String,
	/// Role label used for gating.
	pub role: String,
	/// Optional avatar URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar: Option<String>,
}

/// Login endpoint response after envelope normalization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
	/// Logged-in user.
	pub user: AuthUser,
	/// Access token, already persisted by [`ApiClient::login`].
	pub access_token: AccessToken,
	/// Refresh token, when the backend returns one in the body instead of a cookie.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<AccessToken>,
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Logs in and stores the returned access token.
	///
	/// A 401 from the login endpoint is returned as-is; it never triggers a refresh.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse> {
		let response: LoginResponse = self.post(endpoints::auth::LOGIN, credentials).await?;

		self.credentials.set(response.access_token.clone())?;

		Ok(response)
	}

	/// Ends the server-side session and clears the stored credential.
	///
	/// The credential is cleared even when the logout call fails; that failure is still
	/// returned to the caller.
	pub async fn logout(&self) -> Result<()> {
		let result = self.send(ApiRequest::post(endpoints::auth::LOGOUT)).await.map(|_| ());

		self.credentials.clear()?;

		result
	}

	/// Fetches the authenticated user.
	pub async fn current_user(&self) -> Result<AuthUser> {
		self.get(endpoints::auth::ME).await
	}

	/// Restores a session from a stored credential.
	///
	/// Returns `None` without contacting the server when no token is stored. When the stored
	/// token cannot be turned into a user, the credential is cleared and `None` is returned.
	pub async fn restore_session(&self) -> Result<Option<AuthUser>> {
		if self.credentials.get()?.is_none() {
			return Ok(None);
		}

		match self.current_user().await {
			Ok(user) => Ok(Some(user)),
			Err(e) => {
				obs::warn_event(
					Stage::Request,
					&format!("Stored session could not be restored; clearing it: {e}"),
				);
				self.credentials.clear()?;

				Ok(None)
			},
		}
	}
}
