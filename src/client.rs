//! Authenticated API client: bearer authorization, envelope normalization, and 401 recovery.

pub mod refresh;

pub use refresh::RefreshMetrics;

// crates.io
use ::http::{HeaderValue, StatusCode};
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	credential::{AccessToken, CredentialStore},
	endpoints,
	envelope::{self, Paginated, PaginationParams},
	error::{ApiError, ConfigError, DecodeError},
	http::{ApiRequest, ApiResponse, ApiTransport, RawResponse},
	obs::{self, PipelineSpan, Stage},
};
#[cfg(feature = "reqwest")]
use crate::{credential::MemoryCredentialStore, http::ReqwestTransport};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Side effect run once a refresh fails and the session has been cleared.
///
/// Browser front ends navigate to `login_route`; services typically log or tear down state.
pub trait SessionExpiredHandler
where
	Self: Send + Sync,
{
	/// Called with the configured login route after the stored credential was cleared.
	fn on_session_expired(&self, login_route: &str);
}
impl<F> SessionExpiredHandler for F
where
	F: Send + Sync + Fn(&str),
{
	fn on_session_expired(&self, login_route: &str) {
		self(login_route)
	}
}

/// Default handler that only records the redirect target in the logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRedirect;
impl SessionExpiredHandler for LogRedirect {
	fn on_session_expired(&self, login_route: &str) {
		obs::warn_event(Stage::Refresh, &format!("Session expired; redirecting to {login_route}."));
	}
}

/// Authenticated HTTP client for the back-office API.
///
/// Every request picks up the stored bearer token, every successful body has the backend
/// envelope stripped, and a 401 on an eligible request triggers one shared token refresh
/// followed by a replay. Clones share the transport, credential store, and refresh state;
/// separately constructed clients never share refresh state.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Transport used for every outbound request, including refreshes.
	pub transport: Arc<T>,
	/// Store holding the current access token.
	pub credentials: Arc<dyn CredentialStore>,
	/// Validated client configuration.
	pub config: ClientConfig,
	/// Handler invoked after an unrecoverable refresh failure.
	pub session_expired: Arc<dyn SessionExpiredHandler>,
	/// Counters describing refresh activity on this client.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_state: Arc<Mutex<refresh::RefreshState>>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		credentials: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			credentials,
			config,
			session_expired: Arc::new(LogRedirect),
			refresh_metrics: Default::default(),
			refresh_state: Default::default(),
		}
	}

	/// Replaces the handler invoked when the session cannot be renewed.
	pub fn with_session_expired_handler(
		mut self,
		handler: impl 'static + SessionExpiredHandler,
	) -> Self {
		self.session_expired = Arc::new(handler);

		self
	}

	/// Sends `request` through the full pipeline and returns the normalized response.
	///
	/// Non-2xx responses other than a recoverable 401 surface as [`Error::Api`] untouched.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let span = PipelineSpan::new(Stage::Request, request.method.as_str(), &request.path);

		span.instrument(self.run(request)).await
	}

	/// Sends a `GET` and decodes the normalized body into `R`.
	pub async fn get<R>(&self, path: &str) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.fetch(ApiRequest::get(path)).await
	}

	/// Sends a `GET` with query pairs and decodes the normalized body into `R`.
	pub async fn get_with_query<R, I, K, V>(&self, path: &str, query: I) -> Result<R>
	where
		R: DeserializeOwned,
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.fetch(ApiRequest::get(path).with_query(query)).await
	}

	/// Fetches one page of a paginated list endpoint.
	pub async fn get_page<R>(&self, path: &str, params: &PaginationParams) -> Result<Paginated<R>>
	where
		R: DeserializeOwned,
	{
		self.get_with_query(path, params.to_query()).await
	}

	/// Sends a `POST` with a JSON body and decodes the normalized body into `R`.
	pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.fetch(ApiRequest::post(path).with_json(to_json(body)?)).await
	}

	/// Sends a `PUT` with a JSON body and decodes the normalized body into `R`.
	pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.fetch(ApiRequest::put(path).with_json(to_json(body)?)).await
	}

	/// Sends a `DELETE`, discarding any response body.
	pub async fn delete(&self, path: &str) -> Result<()> {
		self.send(ApiRequest::delete(path)).await.map(|_| ())
	}

	/// Attaches `Authorization: Bearer <token>` when the store holds a live token.
	///
	/// Requests without a stored token are left untouched; store failures are logged and the
	/// request proceeds unauthenticated.
	pub fn authorize(&self, request: &mut ApiRequest) {
		match self.credentials.get() {
			Ok(Some(token)) if !token.is_blank() => match bearer_header(&token) {
				Ok(value) => request.set_authorization(value),
				Err(_) => obs::warn_event(
					Stage::Request,
					"Stored access token is not a valid header value; sending unauthenticated.",
				),
			},
			Ok(_) => {},
			Err(e) => obs::warn_event(
				Stage::Request,
				&format!("Credential store read failed; sending unauthenticated: {e}"),
			),
		}
	}

	/// Returns `true` when a 401 for `request` may be recovered through a token refresh.
	pub fn is_recoverable(&self, request: &ApiRequest) -> bool {
		!request.is_retried()
			&& !request.targets(endpoints::auth::REFRESH)
			&& !request.targets(endpoints::auth::LOGIN)
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.refresh_state.lock().is_refreshing()
	}

	async fn run(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		self.authorize(&mut request);

		let response = self.dispatch(&request).await?;

		if response.status == StatusCode::UNAUTHORIZED && self.is_recoverable(&request) {
			return self.recover(request).await;
		}

		finish(&request, response)
	}

	/// Replays `request` once with `token`, bypassing the credential store.
	async fn replay(&self, mut request: ApiRequest, token: &AccessToken) -> Result<ApiResponse> {
		let span = PipelineSpan::new(Stage::Replay, request.method.as_str(), &request.path);

		request.mark_retried();
		request.set_authorization(bearer_header(token)?);

		span.instrument(async {
			let response = self.dispatch(&request).await?;

			finish(&request, response)
		})
		.await
	}

	async fn dispatch(&self, request: &ApiRequest) -> Result<RawResponse> {
		let url = self.config.endpoint(&request.path)?;

		Ok(self.transport.execute(url, request).await?)
	}

	async fn fetch<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: DeserializeOwned,
	{
		let path = request.path.clone();
		let response = self.send(request).await?;

		decode(&path, response.data)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client for `config`, provisioning a cookie-aware reqwest transport.
	pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, credentials, transport))
	}

	/// Creates a client from the environment with an in-memory credential store.
	pub fn from_env() -> Result<Self> {
		let config = ClientConfig::from_env()?;
		let credentials = Arc::new(MemoryCredentialStore::for_config(&config));

		Self::new(config, credentials)
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			credentials: self.credentials.clone(),
			config: self.config.clone(),
			session_expired: self.session_expired.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh_state: self.refresh_state.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refreshing", &self.is_refreshing())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

fn bearer_header(token: &AccessToken) -> Result<HeaderValue, ConfigError> {
	let mut value = HeaderValue::from_str(&token.bearer())?;

	value.set_sensitive(true);

	Ok(value)
}

fn finish(request: &ApiRequest, response: RawResponse) -> Result<ApiResponse> {
	if !response.is_success() {
		return Err(ApiError::from_response(response.status.as_u16(), response.lossy_json()).into());
	}

	let body = response
		.parse_json()
		.map_err(|source| DecodeError::Json { path: request.path.clone(), source })?;

	Ok(ApiResponse {
		status: response.status,
		headers: response.headers,
		data: envelope::normalize(body),
	})
}

fn decode<R>(path: &str, data: JsonValue) -> Result<R>
where
	R: DeserializeOwned,
{
	serde_path_to_error::deserialize(data)
		.map_err(|source| DecodeError::Shape { path: path.to_owned(), source }.into())
}

fn to_json<B>(body: &B) -> Result<JsonValue>
where
	B: ?Sized + Serialize,
{
	serde_json::to_value(body).map_err(|e| ConfigError::RequestBody(e).into())
}
