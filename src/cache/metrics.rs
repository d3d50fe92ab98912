// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for cache lookups and issuance attempts.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	rate_limited: AtomicU64,
}
impl CacheMetrics {
	/// Returns the number of calls served from the cached credential.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of issuance attempts that reserved a rate-limit slot.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful issuances.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed issuances.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of calls denied by the rate limiter.
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rate_limited(&self) {
		self.rate_limited.fetch_add(1, Ordering::Relaxed);
	}
}
