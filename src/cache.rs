//! Token cache orchestration: fast path for a usable credential, rate-limited slow path otherwise.
//!
//! Every call first rolls the rate-limit window and checks the store. A usable credential is
//! returned without touching the network or the limiter. On a miss the cache reserves a slot,
//! calls the issuer with no lock held, then either commits the slot and stores the new credential
//! or gives the slot back. Dropping an in-flight call (for example through a timeout) also gives
//! the slot back.
//!
//! Without coalescing, concurrent callers that miss the cache each reserve and each issue, so a
//! burst can spend several slots on one refresh. Set
//! [`CachePolicy::coalesce_issuance`] to queue slow-path callers behind a single in-flight
//! issuance instead.

mod metrics;

pub use metrics::CacheMetrics;

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	config::{CachePolicy, IssuerConfig},
	credential::Credential,
	error::ConfigError,
	issuer::TokenIssuer,
	obs::{self, IssuanceOutcome, IssueSpan},
	rate_limit::{RateLimiter, RequestWindow},
	store::TokenStore,
};

/// Shared handle serving one client-credentials token to any number of callers.
///
/// Cloning is cheap; clones share the same store, limiter, and counters.
#[derive(Clone)]
pub struct TokenCache {
	config: Arc<IssuerConfig>,
	issuer: Arc<dyn TokenIssuer>,
	clock: Arc<dyn Clock>,
	policy: Arc<CachePolicy>,
	store: Arc<TokenStore>,
	limiter: Arc<RateLimiter>,
	metrics: Arc<CacheMetrics>,
	flight: Arc<AsyncMutex<()>>,
}
impl TokenCache {
	/// Creates a cache with the default policy and the system clock.
	pub fn new(config: IssuerConfig, issuer: Arc<dyn TokenIssuer>) -> Self {
		Self::assemble(config, issuer, CachePolicy::default(), Arc::new(SystemClock))
	}

	/// Starts a builder for caches with a custom policy or clock.
	pub fn builder(config: IssuerConfig, issuer: Arc<dyn TokenIssuer>) -> TokenCacheBuilder {
		TokenCacheBuilder {
			config,
			issuer,
			policy: CachePolicy::default(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Creates a cache backed by [`ReqwestIssuer`](crate::issuer::ReqwestIssuer).
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(config: IssuerConfig) -> Result<Self, ConfigError> {
		let issuer = crate::issuer::ReqwestIssuer::new()?;

		Ok(Self::new(config, Arc::new(issuer)))
	}

	fn assemble(
		config: IssuerConfig,
		issuer: Arc<dyn TokenIssuer>,
		policy: CachePolicy,
		clock: Arc<dyn Clock>,
	) -> Self {
		let limiter = RateLimiter::from_policy(&policy, clock.now());

		Self {
			config: Arc::new(config),
			issuer,
			clock,
			policy: Arc::new(policy),
			store: Arc::new(TokenStore::default()),
			limiter: Arc::new(limiter),
			metrics: Arc::new(CacheMetrics::default()),
			flight: Arc::new(AsyncMutex::new(())),
		}
	}

	/// Returns a usable access token, issuing a new one when the cached token is stale.
	pub async fn token(&self) -> Result<String> {
		let credential = self.credential().await?;

		Ok(credential.access_token.expose().to_owned())
	}

	/// Returns `"{token_type} {access_token}"` built from one credential snapshot.
	pub async fn authorization_header(&self) -> Result<String> {
		let credential = self.credential().await?;

		Ok(credential.authorization_header())
	}

	/// Returns the full usable credential record.
	pub async fn credential(&self) -> Result<Credential> {
		if let Some(current) = self.cached() {
			return Ok(current);
		}
		if !self.policy.coalesce_issuance {
			return self.issue().await;
		}

		let _flight = self.flight.lock().await;

		// The previous holder may have already refreshed the slot.
		if let Some(current) = self.cached() {
			return Ok(current);
		}

		self.issue().await
	}

	/// Drops the cached credential so the next call issues a new one.
	///
	/// The rate-limit window is left untouched.
	pub fn invalidate(&self) -> Option<Credential> {
		self.store.clear()
	}

	/// Counters describing hits, issuances, and denials so far.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Snapshot of the current rate-limit window.
	pub fn rate_limit_window(&self) -> RequestWindow {
		self.limiter.snapshot()
	}

	/// Policy the cache was built with.
	pub fn policy(&self) -> &CachePolicy {
		&self.policy
	}

	/// Clock driving freshness and window decisions.
	pub fn clock(&self) -> &dyn Clock {
		self.clock.as_ref()
	}

	fn cached(&self) -> Option<Credential> {
		let now = self.clock.now();

		self.limiter.roll_window_at(now);

		let current = self.store.peek_usable_at(now, self.policy.safety_margin)?;

		self.metrics.record_hit();
		obs::cache_hit(&current);

		Some(current)
	}

	async fn issue(&self) -> Result<Credential> {
		let span = IssueSpan::new("issue");

		span.instrument(async move {
			let limit = self.limiter.max_per_window();
			let reservation = match self.limiter.reserve_at(self.clock.now()) {
				Ok(reservation) => reservation,
				Err(directive) => {
					self.metrics.record_rate_limited();
					obs::record_issuance_outcome(IssuanceOutcome::RateLimited);
					obs::rate_limited(&directive, limit);

					return Err(Error::RateLimitExceeded { limit, directive });
				},
			};

			self.metrics.record_attempt();
			obs::record_issuance_outcome(IssuanceOutcome::Attempt);
			obs::issuance_started(&self.limiter.snapshot(), limit);

			match self.issuer.request_token(&self.config).await {
				Ok(credential) => {
					reservation.commit();

					if !self.store.replace_if_newer(credential.clone()) {
						obs::superseded(&credential);
					}

					self.metrics.record_success();
					obs::record_issuance_outcome(IssuanceOutcome::Success);
					obs::issued(&credential);

					Ok(credential)
				},
				Err(e) => {
					drop(reservation);
					self.metrics.record_failure();
					obs::record_issuance_outcome(IssuanceOutcome::Failure);
					obs::issuance_failed(&e);

					Err(e.into())
				},
			}
		})
		.await
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("config", &self.config)
			.field("policy", &self.policy)
			.field("window", &self.limiter.snapshot())
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

/// Builder for [`TokenCache`] values with a custom policy or clock.
pub struct TokenCacheBuilder {
	config: IssuerConfig,
	issuer: Arc<dyn TokenIssuer>,
	policy: CachePolicy,
	clock: Arc<dyn Clock>,
}
impl TokenCacheBuilder {
	/// Overrides the cache policy.
	pub fn policy(mut self, policy: CachePolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the clock used for freshness and window decisions.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Validates the policy and builds the cache; the first window starts now.
	pub fn build(self) -> Result<TokenCache, ConfigError> {
		self.policy.validate()?;

		Ok(TokenCache::assemble(self.config, self.issuer, self.policy, self.clock))
	}
}
impl Debug for TokenCacheBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCacheBuilder")
			.field("config", &self.config)
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}
