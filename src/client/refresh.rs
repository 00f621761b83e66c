//! Single-flight access-token refresh with a queue of parked requests.
//!
//! A 401 on an eligible request moves the client from `Idle` to `Refreshing` and issues one
//! `POST /auth/refresh` through the raw transport. Every other eligible 401 that arrives while
//! the call is outstanding parks a one-shot continuation in the queue instead of starting its
//! own refresh. When the call resolves, parked requests are released in registration order with
//! either the new token (and replayed) or the shared failure. A failed refresh clears the stored
//! credential and runs the session-expired handler before any caller observes the error.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use ::http::HeaderValue;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	client::ApiClient,
	credential::AccessToken,
	endpoints,
	error::RefreshError,
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, PipelineSpan, RefreshOutcome, Stage},
};

type RefreshResult = Result<AccessToken, Arc<RefreshError>>;
type Waiter = oneshot::Sender<RefreshResult>;

/// Refresh state owned by a client and shared by its clones.
#[derive(Debug, Default)]
pub(crate) enum RefreshState {
	/// No refresh in flight.
	#[default]
	Idle,
	/// One refresh call is outstanding; parked continuations in registration order.
	Refreshing { waiters: Vec<Waiter> },
}
impl RefreshState {
	pub(crate) fn is_refreshing(&self) -> bool {
		matches!(self, Self::Refreshing { .. })
	}
}

enum Ticket {
	Leader(RefreshCycle),
	Follower(oneshot::Receiver<RefreshResult>),
}

/// Ownership of the in-flight refresh. Dropping it before [`RefreshCycle::release`] returns the
/// state to `Idle` and drops every waiter, which surfaces as [`Error::RefreshInterrupted`].
struct RefreshCycle {
	state: Arc<Mutex<RefreshState>>,
	released: bool,
}
impl RefreshCycle {
	fn release(&mut self) -> Vec<Waiter> {
		self.released = true;

		match std::mem::take(&mut *self.state.lock()) {
			RefreshState::Refreshing { waiters } => waiters,
			RefreshState::Idle => Vec::new(),
		}
	}
}
impl Drop for RefreshCycle {
	fn drop(&mut self) {
		if !self.released {
			let abandoned = self.release();

			obs::warn_event(
				Stage::Refresh,
				&format!("Refresh abandoned; interrupting {} parked request(s).", abandoned.len()),
			);
		}
	}
}

impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Recovers an eligible 401 by joining (or starting) the shared refresh, then replaying.
	pub(crate) async fn recover(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		request.mark_retried();

		match self.enter_refresh() {
			Ticket::Leader(cycle) => self.lead_refresh(cycle, request).await,
			Ticket::Follower(parked) => {
				self.refresh_metrics.record_queued();
				obs::record_refresh_outcome(RefreshOutcome::Queued);
				obs::debug_event(Stage::Refresh, "Request parked behind in-flight refresh.");

				match parked.await {
					Ok(Ok(token)) => self.replay(request, &token).await,
					Ok(Err(err)) => Err(Error::SessionExpired(err)),
					Err(_) => Err(Error::RefreshInterrupted),
				}
			},
		}
	}

	/// Requests a new access token from the refresh endpoint.
	///
	/// The call goes straight to the transport: it carries no bearer header and is never
	/// subject to 401 recovery. Only the ambient session cookie authenticates it.
	pub async fn request_new_token(&self) -> Result<AccessToken, RefreshError> {
		let request = ApiRequest::post(endpoints::auth::REFRESH).with_json(json!({}));
		let span = PipelineSpan::new(Stage::Refresh, request.method.as_str(), &request.path);

		span.instrument(async {
			let url = self.config.endpoint(&request.path).map_err(RefreshError::Endpoint)?;
			let response =
				self.transport.execute(url, &request).await.map_err(RefreshError::Transport)?;

			if !response.is_success() {
				return Err(RefreshError::Rejected {
					status: response.status.as_u16(),
					body: response.lossy_json(),
				});
			}

			let body = response.parse_json().map_err(RefreshError::MalformedResponse)?;

			extract_access_token(&body).ok_or(RefreshError::MissingAccessToken)
		})
		.await
	}

	fn enter_refresh(&self) -> Ticket {
		let mut state = self.refresh_state.lock();

		if let RefreshState::Refreshing { waiters } = &mut *state {
			let (tx, rx) = oneshot::channel();

			waiters.push(tx);

			return Ticket::Follower(rx);
		}

		*state = RefreshState::Refreshing { waiters: Vec::new() };

		Ticket::Leader(RefreshCycle { state: self.refresh_state.clone(), released: false })
	}

	async fn lead_refresh(
		&self,
		mut cycle: RefreshCycle,
		request: ApiRequest,
	) -> Result<ApiResponse> {
		self.refresh_metrics.record_attempt();
		obs::record_refresh_outcome(RefreshOutcome::Attempt);
		obs::debug_event(Stage::Refresh, "Access token rejected; refreshing.");

		let outcome = match self.request_new_token().await {
			Ok(token) =>
				self.credentials.set(token.clone()).map(|()| token).map_err(RefreshError::Store),
			Err(e) => Err(e),
		};

		match outcome {
			Ok(token) => {
				let waiters = cycle.release();

				self.refresh_metrics.record_success();
				obs::record_refresh_outcome(RefreshOutcome::Success);
				obs::debug_event(
					Stage::Refresh,
					&format!("Refresh succeeded; releasing {} parked request(s).", waiters.len()),
				);

				for waiter in waiters {
					let _ = waiter.send(Ok(token.clone()));
				}

				self.replay(request, &token).await
			},
			Err(e) => {
				let err = Arc::new(e);

				self.end_session(&err);

				let waiters = cycle.release();

				self.refresh_metrics.record_failure();
				obs::record_refresh_outcome(RefreshOutcome::Failure);

				for waiter in waiters {
					let _ = waiter.send(Err(err.clone()));
				}

				Err(Error::SessionExpired(err))
			},
		}
	}

	fn end_session(&self, err: &RefreshError) {
		obs::warn_event(Stage::Refresh, &format!("Refresh failed; clearing session: {err}"));

		if let Err(e) = self.credentials.clear() {
			obs::warn_event(Stage::Refresh, &format!("Failed to clear stored credential: {e}"));
		}

		self.session_expired.on_session_expired(&self.config.login_route);
	}
}

/// Pulls the access token out of a refresh response.
///
/// The payload is `data` when it is present and truthy, otherwise the whole body, so both
/// `{ data: { access_token } }` and `{ access_token }` are accepted. A truthy `data` that is
/// not an object carries no token. Blank tokens and tokens that cannot form an `Authorization`
/// header count as missing.
pub fn extract_access_token(body: &JsonValue) -> Option<AccessToken> {
	let payload = match body.get("data") {
		Some(data) if is_truthy(data) => data,
		_ => body,
	};

	payload
		.get("access_token")
		.and_then(JsonValue::as_str)
		.map(AccessToken::new)
		.filter(|token| !token.is_blank())
		.filter(|token| HeaderValue::from_str(&token.bearer()).is_ok())
}

fn is_truthy(value: &JsonValue) -> bool {
	match value {
		JsonValue::Null => false,
		JsonValue::Bool(flag) => *flag,
		JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
		JsonValue::String(text) => !text.is_empty(),
		JsonValue::Array(_) | JsonValue::Object(_) => true,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn extract_accepts_enveloped_and_flat_shapes() {
		let enveloped = json!({ "success": true, "data": { "access_token": "T2" } });
		let flat = json!({ "access_token": "T3", "token_type": "bearer" });

		assert_eq!(extract_access_token(&enveloped), Some(AccessToken::new("T2")));
		assert_eq!(extract_access_token(&flat), Some(AccessToken::new("T3")));
	}

	#[test]
	fn extract_rejects_missing_or_blank_tokens() {
		assert!(extract_access_token(&json!({ "success": true, "data": {} })).is_none());
		assert!(extract_access_token(&json!({ "access_token": "" })).is_none());
		assert!(extract_access_token(&json!({ "access_token": 42 })).is_none());
		assert!(extract_access_token(&JsonValue::Null).is_none());
	}

	#[test]
	fn falsy_data_falls_back_to_top_level_token() {
		for data in [JsonValue::Null, json!(false), json!(0), json!("")] {
			let body = json!({ "data": data, "access_token": "T4" });

			assert_eq!(extract_access_token(&body), Some(AccessToken::new("T4")));
		}
	}

	#[test]
	fn truthy_non_object_data_carries_no_token() {
		for data in [json!(true), json!(1), json!("T5"), json!([{ "access_token": "T5" }])] {
			let body = json!({ "data": data, "access_token": "T4" });

			assert!(extract_access_token(&body).is_none());
		}
	}

	#[test]
	fn tokens_unusable_as_header_values_are_missing() {
		assert!(extract_access_token(&json!({ "access_token": "bad\ntoken" })).is_none());
		assert!(extract_access_token(&json!({ "data": { "access_token": "T\u{0}" } })).is_none());
	}

	#[test]
	fn dropped_cycle_returns_to_idle_and_interrupts_waiters() {
		let state = Arc::new(Mutex::new(RefreshState::Idle));
		let (tx, mut rx) = oneshot::channel();

		*state.lock() = RefreshState::Refreshing { waiters: vec![tx] };
		drop(RefreshCycle { state: state.clone(), released: false });

		assert!(!state.lock().is_refreshing());
		assert!(rx.try_recv().is_err(), "Waiter sender should be dropped with the cycle.");
	}

	#[test]
	fn released_cycle_leaves_newer_refresh_untouched() {
		let state = Arc::new(Mutex::new(RefreshState::Refreshing { waiters: Vec::new() }));
		let mut cycle = RefreshCycle { state: state.clone(), released: false };

		assert!(cycle.release().is_empty());

		*state.lock() = RefreshState::Refreshing { waiters: Vec::new() };
		drop(cycle);

		assert!(state.lock().is_refreshing(), "A newer cycle must survive the old guard's drop.");
	}
}
