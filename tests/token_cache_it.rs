mod common;

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use tokio::sync::Semaphore;
// self
use common::*;

fn setup(expires_in: Duration) -> (ManualClock, Arc<FakeIssuer>) {
	let clock = ManualClock::new(START);
	let issuer = Arc::new(FakeIssuer::new(&clock).with_expires_in(expires_in));

	(clock, issuer)
}

#[tokio::test]
async fn cached_token_is_served_until_safety_margin() {
	let (clock, issuer) = setup(Duration::hours(1));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	assert_eq!(cache.token().await.expect("First call should issue."), "T1");

	clock.advance(Duration::minutes(54) + Duration::seconds(59));

	assert_eq!(cache.token().await.expect("Call before the margin should hit."), "T1");
	assert_eq!(issuer.calls(), 1);

	clock.advance(Duration::seconds(1));

	assert_eq!(cache.token().await.expect("Call at the margin should re-issue."), "T2");
	assert_eq!(issuer.calls(), 2);
	assert_eq!(cache.rate_limit_window().count, 2);
}

#[tokio::test]
async fn sixth_issuance_in_window_is_rate_limited() {
	let (clock, issuer) = setup(Duration::ZERO);
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	for n in 1..=5 {
		let token = cache.token().await.expect("Issuance within the cap should succeed.");

		assert_eq!(token, format!("T{n}"));
	}

	let err = cache.token().await.expect_err("Sixth issuance should be denied.");
	let Error::RateLimitExceeded { limit, directive } = err else {
		panic!("Expected a rate-limit error, got {err:?}.");
	};

	assert_eq!(limit, 5);
	assert_eq!(directive.earliest_retry_at, START + Duration::hours(1));
	assert_eq!(directive.recommended_backoff, Duration::hours(1));
	assert_eq!(issuer.calls(), 5);
	assert_eq!(cache.rate_limit_window().count, 5);
}

#[tokio::test]
async fn failed_issuance_gives_its_slot_back() {
	let (clock, issuer) = setup(Duration::hours(1));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	issuer.set_failing(true);

	for _ in 0..10 {
		let err = cache.token().await.expect_err("Failing issuer should surface an error.");

		assert!(matches!(
			err,
			Error::Issuance(IssuanceError::TokenEndpoint { status: Some(503), .. })
		));
		assert_eq!(cache.rate_limit_window().count, 0);
	}

	issuer.set_failing(false);

	assert_eq!(cache.token().await.expect("Recovered issuer should succeed."), "T11");
	assert_eq!(cache.rate_limit_window().count, 1);
	assert_eq!(issuer.calls(), 11);
}

#[tokio::test]
async fn authorization_header_pairs_type_and_token_from_one_issuance() {
	let (clock, issuer) = setup(Duration::hours(1));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	assert_eq!(cache.authorization_header().await.expect("Header should render."), "Bearer T1");

	issuer.set_token_type("MAC");
	clock.advance(Duration::hours(1));

	assert_eq!(cache.authorization_header().await.expect("Header should render."), "MAC T2");
	assert_eq!(
		cache.authorization_header().await.expect("Cached header should render."),
		"MAC T2"
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_never_exceed_the_cap() {
	let clock = ManualClock::new(START);
	let gate = Arc::new(Semaphore::new(0));
	let issuer = Arc::new(FakeIssuer::gated(&clock, gate.clone()));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());
	let handles = (0..20)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.token().await })
		})
		.collect::<Vec<_>>();

	eventually(|| issuer.calls() == 5 && cache.metrics().rate_limited() == 15).await;
	gate.add_permits(5);

	let mut issued = 0;
	let mut denied = 0;

	for handle in handles {
		match handle.await.expect("Caller task should not panic.") {
			Ok(_) => issued += 1,
			Err(err) if err.is_rate_limited() => denied += 1,
			Err(err) => panic!("Unexpected error: {err}."),
		}
	}

	assert_eq!(issued, 5);
	assert_eq!(denied, 15);
	assert_eq!(issuer.calls(), 5);
	assert_eq!(cache.rate_limit_window().count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalesced_misses_share_one_issuance() {
	let clock = ManualClock::new(START);
	let gate = Arc::new(Semaphore::new(0));
	let issuer = Arc::new(FakeIssuer::gated(&clock, gate.clone()));
	let policy = CachePolicy::default().with_coalesced_issuance(true);
	let cache = build_cache(&issuer, &clock, policy);
	let handles = (0..10)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.token().await })
		})
		.collect::<Vec<_>>();

	eventually(|| issuer.calls() == 1).await;
	gate.add_permits(1);

	for handle in handles {
		let token = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Coalesced callers should all receive the token.");

		assert_eq!(token, "T1");
	}

	assert_eq!(issuer.calls(), 1);
	assert_eq!(cache.rate_limit_window().count, 1);
	assert_eq!(cache.metrics().hits(), 9);
}

#[tokio::test]
async fn window_resets_strictly_after_its_deadline() {
	let (clock, issuer) = setup(Duration::ZERO);
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	for _ in 0..5 {
		cache.token().await.expect("Issuance within the cap should succeed.");
	}

	let resets_at = START + Duration::hours(1);

	clock.set(resets_at - Duration::seconds(1));

	assert!(cache.token().await.expect_err("Cap should still apply.").is_rate_limited());

	clock.set(resets_at);

	let err = cache.token().await.expect_err("Deadline itself is inside the window.");

	assert!(err.is_rate_limited());

	clock.set(resets_at + Duration::seconds(1));

	assert_eq!(cache.token().await.expect("New window should allow issuance."), "T6");

	let window = cache.rate_limit_window();

	assert_eq!(window.count, 1);
	assert_eq!(window.resets_at, resets_at + Duration::seconds(1) + Duration::hours(1));
}

#[tokio::test]
async fn short_lived_token_is_reissued_under_default_margin() {
	let (clock, issuer) = setup(Duration::seconds(60));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	assert_eq!(cache.authorization_header().await.expect("First call should issue."), "Bearer T1");
	assert_eq!(cache.authorization_header().await.expect("Stale token is re-issued."), "Bearer T2");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn short_lived_token_is_reissued_after_custom_margin() {
	let (clock, issuer) = setup(Duration::seconds(60));
	let policy = CachePolicy::default().with_safety_margin(Duration::seconds(4));
	let cache = build_cache(&issuer, &clock, policy);

	assert_eq!(cache.authorization_header().await.expect("First call should issue."), "Bearer T1");

	clock.advance(Duration::seconds(55));

	assert_eq!(cache.authorization_header().await.expect("Token is still fresh."), "Bearer T1");

	clock.advance(Duration::seconds(1));

	assert_eq!(cache.authorization_header().await.expect("Token is now stale."), "Bearer T2");
	assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn cancelled_issuance_releases_its_slot() {
	let clock = ManualClock::new(START);
	let gate = Arc::new(Semaphore::new(0));
	let issuer = Arc::new(FakeIssuer::gated(&clock, gate));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());
	let outcome = tokio::time::timeout(std::time::Duration::from_millis(50), cache.token()).await;

	assert!(outcome.is_err());
	assert_eq!(issuer.calls(), 1);
	assert_eq!(cache.rate_limit_window().count, 0);
}

#[tokio::test]
async fn stale_token_is_never_served_when_limited() {
	let (clock, issuer) = setup(Duration::hours(1));
	let policy = CachePolicy::default().with_max_issuances_per_window(1);
	let cache = build_cache(&issuer, &clock, policy);

	assert_eq!(cache.token().await.expect("First call should issue."), "T1");
	assert_eq!(cache.token().await.expect("Exhausted window still serves hits."), "T1");

	clock.advance(Duration::minutes(56));

	let err = cache.token().await.expect_err("Stale token must not be served.");

	assert!(err.is_rate_limited());
	assert_eq!(err.retry_at(clock.now()), Some(START + Duration::hours(1)));
}

#[tokio::test]
async fn invalidate_forces_the_next_issuance() {
	let (clock, issuer) = setup(Duration::hours(1));
	let cache = build_cache(&issuer, &clock, CachePolicy::default());

	assert_eq!(cache.token().await.expect("First call should issue."), "T1");
	assert!(cache.invalidate().is_some());
	assert!(cache.invalidate().is_none());
	assert_eq!(cache.token().await.expect("Invalidated cache should re-issue."), "T2");
	assert_eq!(cache.rate_limit_window().count, 2);
}

#[tokio::test]
async fn metrics_track_hits_issuances_and_denials() {
	let (clock, issuer) = setup(Duration::hours(1));
	let policy = CachePolicy::default().with_max_issuances_per_window(2);
	let cache = build_cache(&issuer, &clock, policy);

	issuer.set_failing(true);
	cache.token().await.expect_err("Failing issuer should surface an error.");
	issuer.set_failing(false);
	cache.token().await.expect("Issuance should succeed.");
	cache.token().await.expect("Cached token should be served.");
	cache.invalidate();
	cache.token().await.expect("Second slot should be available.");
	cache.invalidate();
	cache.token().await.expect_err("Cap of two should be reached.");

	let metrics = cache.metrics();

	assert_eq!(metrics.hits(), 1);
	assert_eq!(metrics.attempts(), 3);
	assert_eq!(metrics.successes(), 2);
	assert_eq!(metrics.failures(), 1);
	assert_eq!(metrics.rate_limited(), 1);
}

/// Issuer whose n-th exchange starts at the current instant and finishes once `gates[n]` opens.
struct OutOfOrderIssuer {
	clock: ManualClock,
	gates: [Arc<Semaphore>; 2],
	calls: AtomicUsize,
}
impl TokenIssuer for OutOfOrderIssuer {
	fn request_token<'a>(&'a self, _config: &'a IssuerConfig) -> IssueFuture<'a> {
		let n = self.calls.fetch_add(1, Ordering::SeqCst);
		let issued_at = self.clock.now();

		Box::pin(async move {
			self.gates[n].acquire().await.expect("Gate semaphore should stay open.").forget();

			let expires_at = issued_at + Duration::hours(1);

			Ok::<_, IssuanceError>(Credential::new(
				format!("T{}", n + 1),
				"Bearer",
				issued_at,
				expires_at,
			))
		})
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn late_finishing_older_issuance_keeps_the_newer_credential() {
	let clock = ManualClock::new(START);
	let issuer = Arc::new(OutOfOrderIssuer {
		clock: clock.clone(),
		gates: [Arc::new(Semaphore::new(0)), Arc::new(Semaphore::new(0))],
		calls: AtomicUsize::new(0),
	});
	let cache = TokenCache::builder(issuer_config(), issuer.clone())
		.clock(Arc::new(clock.clone()))
		.build()
		.expect("Default policy should validate.");
	let first = tokio::spawn({
		let cache = cache.clone();

		async move { cache.token().await }
	});

	eventually(|| issuer.calls.load(Ordering::SeqCst) == 1).await;
	clock.advance(Duration::minutes(1));

	let second = tokio::spawn({
		let cache = cache.clone();

		async move { cache.token().await }
	});

	eventually(|| issuer.calls.load(Ordering::SeqCst) == 2).await;
	issuer.gates[1].add_permits(1);

	assert_eq!(second.await.expect("Task should not panic.").expect("Issuance succeeds."), "T2");

	issuer.gates[0].add_permits(1);

	assert_eq!(first.await.expect("Task should not panic.").expect("Issuance succeeds."), "T1");
	assert_eq!(cache.token().await.expect("Cached token should be served."), "T2");
	assert_eq!(cache.rate_limit_window().count, 2);
}
