//! Fixed-window issuance limiter with reversible reservations.
//!
//! A slot is reserved before the network call so concurrent callers cannot collectively exceed
//! the cap by racing past a stale count. Failed attempts give their slot back through
//! [`RateLimiter::release`] (or by dropping an uncommitted [`Reservation`]).

// self
use crate::{_prelude::*, config::CachePolicy};

/// Request counter for the current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWindow {
	/// Issuance attempts reserved in the current window.
	pub count: u32,
	/// Instant after which the window rolls over.
	pub resets_at: OffsetDateTime,
}

/// Result of asking the limiter for a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// A slot was reserved; the caller may contact the token endpoint.
	Allow,
	/// The cap is reached; nothing was reserved.
	Delay(RetryDirective),
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Window rollover instant; the first reservation strictly after it succeeds.
	pub earliest_retry_at: OffsetDateTime,
	/// Time remaining until the rollover, measured from the denied request.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}

/// Caps issuance attempts per fixed window.
#[derive(Debug)]
pub struct RateLimiter {
	max_per_window: u32,
	window: Duration,
	state: Mutex<RequestWindow>,
}
impl RateLimiter {
	/// Creates a limiter whose first window ends at `now + window`.
	pub fn new(max_per_window: u32, window: Duration, now: OffsetDateTime) -> Self {
		let state = RequestWindow { count: 0, resets_at: now + window };

		Self { max_per_window, window, state: Mutex::new(state) }
	}

	/// Creates a limiter from the cap and window of `policy`.
	pub fn from_policy(policy: &CachePolicy, now: OffsetDateTime) -> Self {
		Self::new(policy.max_issuances_per_window, policy.window, now)
	}

	/// Maximum attempts per window.
	pub fn max_per_window(&self) -> u32 {
		self.max_per_window
	}

	/// Copy of the current window state.
	pub fn snapshot(&self) -> RequestWindow {
		*self.state.lock()
	}

	/// Starts a new window when `now` is past the current one.
	pub fn roll_window_at(&self, now: OffsetDateTime) {
		let mut state = self.state.lock();

		self.roll(&mut state, now);
	}

	/// Reserves one slot unless the cap for the current window is reached.
	///
	/// A denial leaves the count untouched.
	pub fn try_reserve_at(&self, now: OffsetDateTime) -> RateLimitDecision {
		match self.reserve(now) {
			Ok(_) => RateLimitDecision::Allow,
			Err(directive) => RateLimitDecision::Delay(directive),
		}
	}

	/// Reserves a slot and wraps it in a guard that releases it unless committed.
	pub fn reserve_at(&self, now: OffsetDateTime) -> Result<Reservation<'_>, RetryDirective> {
		let window = self.reserve(now)?;

		Ok(Reservation { limiter: self, window, committed: false })
	}

	/// Gives back one reserved slot; the count never drops below zero.
	pub fn release(&self) {
		let mut state = self.state.lock();

		state.count = state.count.saturating_sub(1);
	}

	fn release_in(&self, window: OffsetDateTime) {
		let mut state = self.state.lock();

		// A slot reserved before a rollover was already discarded with its window.
		if state.resets_at == window {
			state.count = state.count.saturating_sub(1);
		}
	}

	fn reserve(&self, now: OffsetDateTime) -> Result<OffsetDateTime, RetryDirective> {
		let mut state = self.state.lock();

		self.roll(&mut state, now);

		if state.count >= self.max_per_window {
			let backoff = state.resets_at - now;

			return Err(RetryDirective::new(state.resets_at, backoff.max(Duration::ZERO))
				.with_reason(format!(
					"{} token requests already issued in this window",
					state.count
				)));
		}

		state.count += 1;

		Ok(state.resets_at)
	}

	fn roll(&self, state: &mut RequestWindow, now: OffsetDateTime) {
		if now > state.resets_at {
			state.count = 0;
			state.resets_at = now + self.window;
		}
	}
}

/// Slot held by an in-flight issuance.
///
/// Dropping the guard without [`commit`](Reservation::commit) releases the slot, which covers both
/// failed attempts and callers that abandon the future mid-flight.
#[derive(Debug)]
pub struct Reservation<'a> {
	limiter: &'a RateLimiter,
	window: OffsetDateTime,
	committed: bool,
}
impl Reservation<'_> {
	/// Keeps the slot consumed.
	pub fn commit(mut self) {
		self.committed = true;
	}
}
impl Drop for Reservation<'_> {
	fn drop(&mut self) {
		if !self.committed {
			self.limiter.release_in(self.window);
		}
	}
}
