//! Shared fakes for the integration suites.

#![allow(dead_code)]

// std
pub use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
// crates.io
use parking_lot::Mutex;
pub use time::{Duration, OffsetDateTime};
use time::macros;
use tokio::sync::Semaphore;
// self
pub use oauth2_token_cache::{
	cache::TokenCache,
	clock::{Clock, ManualClock},
	config::{CachePolicy, IssuerConfig},
	credential::Credential,
	error::{Error, IssuanceError},
	issuer::{IssueFuture, TokenIssuer},
};

pub const START: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);
pub const TOKEN_ENDPOINT: &str = "https://auth.example.com/oauth/token";
pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";

/// Counting issuer minting `T1`, `T2`, ... stamped with a shared manual clock.
pub struct FakeIssuer {
	calls: AtomicU32,
	fail: AtomicBool,
	token_type: Mutex<String>,
	expires_in: Mutex<Duration>,
	gate: Option<Arc<Semaphore>>,
	clock: ManualClock,
}
impl FakeIssuer {
	pub fn new(clock: &ManualClock) -> Self {
		Self {
			calls: AtomicU32::new(0),
			fail: AtomicBool::new(false),
			token_type: Mutex::new("Bearer".into()),
			expires_in: Mutex::new(Duration::hours(1)),
			gate: None,
			clock: clock.clone(),
		}
	}

	/// Holds every exchange until the gate hands out a permit.
	pub fn gated(clock: &ManualClock, gate: Arc<Semaphore>) -> Self {
		Self { gate: Some(gate), ..Self::new(clock) }
	}

	pub fn with_expires_in(self, expires_in: Duration) -> Self {
		*self.expires_in.lock() = expires_in;

		self
	}

	pub fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn set_token_type(&self, token_type: &str) {
		*self.token_type.lock() = token_type.into();
	}
}
impl TokenIssuer for FakeIssuer {
	fn request_token<'a>(&'a self, config: &'a IssuerConfig) -> IssueFuture<'a> {
		Box::pin(async move {
			assert_eq!(config.client_id(), CLIENT_ID);

			let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			if let Some(gate) = &self.gate {
				gate.acquire().await.expect("Gate semaphore should stay open.").forget();
			}
			if self.fail.load(Ordering::SeqCst) {
				return Err(IssuanceError::TokenEndpoint {
					message: "HTTP 503: upstream unavailable".into(),
					status: Some(503),
					retry_after: None,
				});
			}

			let issued_at = self.clock.now();
			let token_type = self.token_type.lock().clone();
			let expires_at = issued_at + *self.expires_in.lock();

			Ok(Credential::new(format!("T{n}"), token_type, issued_at, expires_at))
		})
	}
}

/// Reqwest client that accepts the self-signed certificates `httpmock` serves.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_client() -> oauth2_token_cache::reqwest::Client {
	oauth2_token_cache::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.")
}

/// Reqwest-backed issuer stamped with `clock`, talking to `httpmock` over TLS.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_issuer(clock: &ManualClock) -> oauth2_token_cache::issuer::ReqwestIssuer {
	use oauth2_token_cache::{
		http::ReqwestHttpClient,
		issuer::{ReqwestIssuer, ReqwestTransportErrorMapper},
	};

	ReqwestIssuer::with_http_client(
		ReqwestHttpClient::with_client(test_reqwest_client()),
		ReqwestTransportErrorMapper,
	)
	.with_clock(Arc::new(clock.clone()))
}

pub fn issuer_config() -> IssuerConfig {
	IssuerConfig::new(TOKEN_ENDPOINT, CLIENT_ID, CLIENT_SECRET)
		.expect("Test issuer configuration should build.")
}

pub fn build_cache(
	issuer: &Arc<FakeIssuer>,
	clock: &ManualClock,
	policy: CachePolicy,
) -> TokenCache {
	TokenCache::builder(issuer_config(), issuer.clone())
		.policy(policy)
		.clock(Arc::new(clock.clone()))
		.build()
		.expect("Test cache policy should validate.")
}

/// Polls `condition` on the tokio timer until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
	for _ in 0..2_000 {
		if condition() {
			return;
		}

		tokio::time::sleep(std::time::Duration::from_millis(1)).await;
	}

	panic!("Condition did not hold within two seconds.");
}
