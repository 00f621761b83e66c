#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::sync::Semaphore;
// self
use lepassage_client::{
	_preludet::*,
	client::ApiClient,
	credential::{AccessToken, CredentialError, CredentialStore, MemoryCredentialStore},
	endpoints,
	error::RefreshError,
	http::{ApiRequest, ApiTransport, RawResponse, TransportFuture},
	http_types::StatusCode,
};

const STALE: &str = "T1";
const FRESH: &str = "T2";

/// Scripted backend: accepts only `Bearer T2`, and holds refresh calls until the gate opens.
struct ScriptedBackend {
	refresh_gate: Semaphore,
	refresh_calls: AtomicUsize,
	refresh_reply: Mutex<RawResponse>,
	seen: Mutex<Vec<(String, Option<String>)>>,
}
impl ScriptedBackend {
	fn new(refresh_reply: RawResponse) -> Arc<Self> {
		Arc::new(Self {
			refresh_gate: Semaphore::new(0),
			refresh_calls: AtomicUsize::new(0),
			refresh_reply: Mutex::new(refresh_reply),
			seen: Mutex::new(Vec::new()),
		})
	}

	fn granting(token: &str) -> Arc<Self> {
		Self::new(RawResponse::json(
			StatusCode::OK,
			&json!({ "success": true, "data": { "access_token": token } }),
		))
	}

	fn rejecting() -> Arc<Self> {
		Self::new(RawResponse::json(StatusCode::UNAUTHORIZED, &json!({ "message": "Expired" })))
	}

	fn open_gate(&self) {
		self.refresh_gate.add_permits(1);
	}

	fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	fn authorizations_for(&self, path: &str) -> Vec<Option<String>> {
		self.seen
			.lock()
			.iter()
			.filter(|(seen_path, _)| seen_path == path)
			.map(|(_, auth)| auth.clone())
			.collect()
	}
}
impl ApiTransport for ScriptedBackend {
	fn execute<'a>(&'a self, _url: Url, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let authorization = request.authorization().map(str::to_owned);

			self.seen.lock().push((request.path.clone(), authorization.clone()));

			if request.path == endpoints::auth::REFRESH {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.refresh_gate
					.acquire()
					.await
					.expect("Refresh gate semaphore should stay open.")
					.forget();

				return Ok(self.refresh_reply.lock().clone());
			}
			if request.path == endpoints::auth::LOGOUT {
				return Ok(RawResponse::new(StatusCode::NO_CONTENT, Vec::new()));
			}
			if authorization.as_deref() == Some("Bearer T2") {
				return Ok(RawResponse::json(
					StatusCode::OK,
					&json!({ "success": true, "data": { "path": request.path } }),
				));
			}

			Ok(RawResponse::json(
				StatusCode::UNAUTHORIZED,
				&json!({ "message": "Unauthenticated." }),
			))
		})
	}
}

/// Memory store whose writes always fail, as a full disk or a revoked keychain would.
#[derive(Default)]
struct ReadOnlyStore(MemoryCredentialStore);
impl CredentialStore for ReadOnlyStore {
	fn get(&self) -> Result<Option<AccessToken>, CredentialError> {
		self.0.get()
	}

	fn set(&self, _token: AccessToken) -> Result<(), CredentialError> {
		Err(CredentialError::Backend { message: "store is read-only".into() })
	}

	fn clear(&self) -> Result<(), CredentialError> {
		self.0.clear()
	}
}

fn build_client(
	backend: &Arc<ScriptedBackend>,
) -> (ApiClient<ScriptedBackend>, Arc<MemoryCredentialStore>, RecordingRedirect) {
	let config = test_config("https://cms.lepassage.test/api/v1");
	let store_backend = Arc::new(MemoryCredentialStore::for_config(&config));

	store_backend.set(AccessToken::new(STALE)).expect("Seeding the stale token should succeed.");

	let (client, redirect) = build_client_with_store(backend, store_backend.clone());

	(client, store_backend, redirect)
}

fn build_client_with_store(
	backend: &Arc<ScriptedBackend>,
	store: Arc<dyn CredentialStore>,
) -> (ApiClient<ScriptedBackend>, RecordingRedirect) {
	let redirect = RecordingRedirect::default();
	let client = ApiClient::with_transport(
		test_config("https://cms.lepassage.test/api/v1"),
		store,
		backend.clone(),
	)
	.with_session_expired_handler(redirect.clone());

	(client, redirect)
}

fn expect_session_expired(outcome: Result<JsonValue>) -> Arc<RefreshError> {
	match outcome {
		Err(Error::SessionExpired(err)) => err,
		other => panic!("Unexpected outcome: {other:?}."),
	}
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	tokio::time::timeout(StdDuration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(StdDuration::from_millis(5)).await;
		}
	})
	.await
	.expect("Condition should hold before the timeout.");
}

fn spawn_requests(
	client: &ApiClient<ScriptedBackend>,
	count: usize,
) -> Vec<tokio::task::JoinHandle<Result<JsonValue>>> {
	(0..count)
		.map(|idx| {
			let client = client.clone();

			tokio::spawn(
				async move { client.get::<JsonValue>(&format!("/admin/orders/{idx}")).await },
			)
		})
		.collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	const REQUESTS: usize = 12;

	let backend = ScriptedBackend::granting(FRESH);
	let (client, store, redirect) = build_client(&backend);
	let handles = spawn_requests(&client, REQUESTS);

	wait_until(|| client.refresh_metrics.queued() == (REQUESTS - 1) as u64).await;

	assert!(client.is_refreshing());
	assert_eq!(backend.refresh_calls(), 1);

	backend.open_gate();

	for (idx, handle) in handles.into_iter().enumerate() {
		let data = handle
			.await
			.expect("Request task should not panic.")
			.expect("Every parked request should be replayed successfully.");

		assert_eq!(data, json!({ "path": format!("/admin/orders/{idx}") }));

		let auths = backend.authorizations_for(&format!("/admin/orders/{idx}"));

		assert_eq!(auths, vec![Some("Bearer T1".to_owned()), Some("Bearer T2".to_owned())]);
	}

	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(client.refresh_metrics.attempts(), 1);
	assert_eq!(client.refresh_metrics.successes(), 1);
	assert!(!client.is_refreshing());
	assert_eq!(store.get().expect("Store read should succeed."), Some(AccessToken::new(FRESH)));
	assert!(redirect.redirects().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_refresh_rejects_every_parked_request_with_the_same_error() {
	const REQUESTS: usize = 3;

	let backend = ScriptedBackend::rejecting();
	let (client, store, redirect) = build_client(&backend);
	let handles = spawn_requests(&client, REQUESTS);

	wait_until(|| client.refresh_metrics.queued() == (REQUESTS - 1) as u64).await;
	backend.open_gate();

	let mut shared: Vec<Arc<RefreshError>> = Vec::new();

	for handle in handles {
		match handle.await.expect("Request task should not panic.") {
			Err(Error::SessionExpired(err)) => {
				assert_eq!(err.status(), Some(401));
				shared.push(err);
			},
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}

	assert!(shared.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(client.refresh_metrics.failures(), 1);
	assert!(store.get().expect("Store read should succeed.").is_none());
	assert_eq!(redirect.redirects(), vec!["/login".to_owned()]);
	assert!(!client.is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_refresh_interrupts_parked_requests() {
	let backend = ScriptedBackend::granting(FRESH);
	let (client, _store, redirect) = build_client(&backend);
	let leader = spawn_requests(&client, 1).remove(0);

	wait_until(|| backend.refresh_calls() == 1).await;

	let follower = {
		let client = client.clone();

		tokio::spawn(async move { client.get::<JsonValue>("/admin/customers").await })
	};

	wait_until(|| client.refresh_metrics.queued() == 1).await;
	leader.abort();

	let err = follower
		.await
		.expect("Follower task should not panic.")
		.expect_err("Follower must not hang on an abandoned refresh.");

	assert!(matches!(err, Error::RefreshInterrupted));
	assert!(!client.is_refreshing());
	assert!(redirect.redirects().is_empty());
}

#[tokio::test]
async fn replayed_request_is_not_retried_twice() {
	// Refresh succeeds but hands back a token the backend still rejects.
	let backend = ScriptedBackend::granting("T3");
	let (client, store, _redirect) = build_client(&backend);

	backend.open_gate();

	let err = client
		.get::<JsonValue>("/admin/products")
		.await
		.expect_err("A replayed 401 must surface to the caller.");

	assert_eq!(err.status(), Some(401));
	assert!(!err.is_session_expired());
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(
		backend.authorizations_for("/admin/products"),
		vec![Some("Bearer T1".to_owned()), Some("Bearer T3".to_owned())]
	);
	assert_eq!(store.get().expect("Store read should succeed."), Some(AccessToken::new("T3")));
}

#[tokio::test]
async fn auth_endpoint_unauthorized_never_refreshes() {
	let backend = ScriptedBackend::rejecting();
	let (client, store, redirect) = build_client(&backend);

	backend.open_gate();

	let refresh = client
		.send(ApiRequest::post(endpoints::auth::REFRESH))
		.await
		.expect_err("A 401 from the refresh endpoint must surface untouched.");
	let login = client
		.send(ApiRequest::post(endpoints::auth::LOGIN))
		.await
		.expect_err("A 401 from the login endpoint must surface untouched.");

	assert!(matches!(refresh, Error::Api(ref api) if api.is_unauthorized()));
	assert!(matches!(login, Error::Api(ref api) if api.is_unauthorized()));
	// Only the direct call above reached the refresh endpoint.
	assert_eq!(backend.refresh_calls(), 1);
	assert_eq!(client.refresh_metrics.attempts(), 0);
	assert_eq!(store.get().expect("Store read should succeed."), Some(AccessToken::new(STALE)));
	assert!(redirect.redirects().is_empty());
}

#[tokio::test]
async fn logout_strips_authorization_from_later_requests() {
	let backend = ScriptedBackend::rejecting();
	let (client, store, redirect) = build_client(&backend);

	backend.open_gate();
	client.logout().await.expect("Logout should succeed against the scripted backend.");

	assert!(store.get().expect("Store read should succeed.").is_none());

	let err = client
		.get::<JsonValue>(endpoints::dashboard::STATS)
		.await
		.expect_err("An anonymous request still hits 401 and a failed refresh.");

	assert!(err.is_session_expired());
	assert_eq!(
		backend.authorizations_for(endpoints::auth::LOGOUT),
		vec![Some("Bearer T1".to_owned())]
	);
	assert_eq!(backend.authorizations_for(endpoints::dashboard::STATS), vec![None]);
	assert_eq!(backend.authorizations_for(endpoints::auth::REFRESH), vec![None]);
	assert_eq!(redirect.redirects(), vec!["/login".to_owned()]);
}

async fn refresh_with_reply(reply: JsonValue) -> (Arc<RefreshError>, Arc<ScriptedBackend>) {
	let backend = ScriptedBackend::new(RawResponse::json(StatusCode::OK, &reply));
	let (client, store, redirect) = build_client(&backend);

	backend.open_gate();

	let err = expect_session_expired(client.get::<JsonValue>("/admin/products").await);

	assert!(store.get().expect("Store read should succeed.").is_none());
	assert_eq!(redirect.redirects(), vec!["/login".to_owned()]);
	assert_eq!(client.refresh_metrics.failures(), 1);
	assert!(!client.is_refreshing());

	(err, backend)
}

#[tokio::test]
async fn successful_refresh_without_token_ends_the_session() {
	let replies = [
		json!({ "success": true, "data": {} }),
		json!({ "success": true, "data": "T2" }),
	];

	for reply in replies {
		let (err, backend) = refresh_with_reply(reply).await;

		assert!(matches!(*err, RefreshError::MissingAccessToken));
		assert_eq!(backend.refresh_calls(), 1);
	}
}

#[tokio::test]
async fn refresh_token_unusable_as_header_ends_the_session() {
	let (err, backend) = refresh_with_reply(json!({ "access_token": "bad\ntoken" })).await;

	assert!(matches!(*err, RefreshError::MissingAccessToken));
	assert_eq!(backend.refresh_calls(), 1);
	// The original attempt is never replayed with the unusable token.
	assert_eq!(backend.authorizations_for("/admin/products"), vec![Some("Bearer T1".to_owned())]);
}

#[tokio::test]
async fn refreshed_token_that_cannot_be_stored_ends_the_session() {
	let backend = ScriptedBackend::granting(FRESH);
	let store = Arc::new(ReadOnlyStore::default());

	store.0.set(AccessToken::new(STALE)).expect("Seeding the inner store should succeed.");

	let (client, redirect) = build_client_with_store(&backend, store.clone());

	backend.open_gate();

	let err = expect_session_expired(client.get::<JsonValue>("/admin/products").await);

	assert!(matches!(*err, RefreshError::Store(CredentialError::Backend { .. })));
	assert_eq!(backend.refresh_calls(), 1);
	assert!(store.get().expect("Store read should succeed.").is_none());
	assert_eq!(redirect.redirects(), vec!["/login".to_owned()]);
	assert_eq!(backend.authorizations_for("/admin/products"), vec![Some("Bearer T1".to_owned())]);
}
