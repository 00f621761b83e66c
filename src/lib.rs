//! Authenticated REST client for the Le Pas Sage back office: bearer credentials, envelope
//! normalization and transparent single-flight token refresh.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod credential;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod http;
pub mod obs;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{ApiClient, SessionExpiredHandler},
		config::ClientConfig,
		credential::{CredentialStore, MemoryCredentialStore},
		http::ReqwestTransport,
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Records every redirect requested by the client so tests can assert on forced logouts.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingRedirect(Arc<Mutex<Vec<String>>>);
	impl RecordingRedirect {
		/// Returns the login routes the client navigated to, oldest first.
		pub fn redirects(&self) -> Vec<String> {
			self.0.lock().clone()
		}
	}
	impl SessionExpiredHandler for RecordingRedirect {
		fn on_session_expired(&self, login_route: &str) {
			self.0.lock().push(login_route.to_owned());
		}
	}

	/// Builds a client config pointing at the provided mock server base URL.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(Url::parse(base_url).expect("Mock base URL should parse."))
			.build()
			.expect("Test client config should build successfully.")
	}

	/// Constructs an [`ApiClient`] backed by an in-memory credential store, a recording redirect
	/// handler, and the reqwest transport used across integration tests.
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (ReqwestTestClient, Arc<MemoryCredentialStore>, RecordingRedirect) {
		let config = test_config(base_url);
		let store_backend = Arc::new(MemoryCredentialStore::for_config(&config));
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let redirect = RecordingRedirect::default();
		let transport = ReqwestTransport::from_config(&config)
			.expect("Failed to build reqwest transport for tests.");
		let client = ApiClient::with_transport(config, store, transport)
			.with_session_expired_handler(redirect.clone());

		(client, store_backend, redirect)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::{Map as JsonMap, Value as JsonValue, json};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
