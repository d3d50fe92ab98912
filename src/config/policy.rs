//! Freshness and rate-limit knobs for [`TokenCache`](crate::cache::TokenCache).

// self
use crate::_prelude::*;

/// Errors raised when a [`CachePolicy`] holds out-of-range values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PolicyError {
	/// At least one issuance per window must be allowed.
	#[error("The issuance cap must allow at least one request per window.")]
	ZeroIssuanceCap,
	/// The rate-limit window must be a positive duration.
	#[error("The rate-limit window must be positive.")]
	NonPositiveWindow,
	/// The safety margin cannot be negative.
	#[error("The safety margin must not be negative.")]
	NegativeSafetyMargin,
}

/// Cache behavior knobs.
///
/// Missing fields fall back to [`CachePolicy::default`] when deserialized, so hosts can keep
/// only the overrides they care about in their own configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
	/// Buffer subtracted from a credential's expiry; defaults to 5 minutes.
	pub safety_margin: Duration,
	/// Maximum issuance attempts per window; defaults to 5.
	pub max_issuances_per_window: u32,
	/// Length of the rate-limit window; defaults to 1 hour.
	pub window: Duration,
	/// Queues concurrent refreshes behind a single in-flight issuance when `true`.
	pub coalesce_issuance: bool,
}
impl CachePolicy {
	/// Default safety margin.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(5);
	/// Default issuance cap.
	pub const DEFAULT_MAX_ISSUANCES_PER_WINDOW: u32 = 5;
	/// Default window length.
	pub const DEFAULT_WINDOW: Duration = Duration::hours(1);

	/// Overrides the safety margin.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin;

		self
	}

	/// Overrides the per-window issuance cap.
	pub fn with_max_issuances_per_window(mut self, max: u32) -> Self {
		self.max_issuances_per_window = max;

		self
	}

	/// Overrides the window length.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = window;

		self
	}

	/// Enables or disables single-flight coalescing of concurrent refreshes.
	pub fn with_coalesced_issuance(mut self, coalesce: bool) -> Self {
		self.coalesce_issuance = coalesce;

		self
	}

	/// Validates the policy values.
	pub fn validate(&self) -> Result<(), PolicyError> {
		if self.max_issuances_per_window == 0 {
			return Err(PolicyError::ZeroIssuanceCap);
		}
		if !self.window.is_positive() {
			return Err(PolicyError::NonPositiveWindow);
		}
		if self.safety_margin.is_negative() {
			return Err(PolicyError::NegativeSafetyMargin);
		}

		Ok(())
	}
}
impl Default for CachePolicy {
	fn default() -> Self {
		Self {
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			max_issuances_per_window: Self::DEFAULT_MAX_ISSUANCES_PER_WINDOW,
			window: Self::DEFAULT_WINDOW,
			coalesce_issuance: false,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_hourly_cap_of_five() {
		let policy = CachePolicy::default();

		assert_eq!(policy.safety_margin, Duration::minutes(5));
		assert_eq!(policy.max_issuances_per_window, 5);
		assert_eq!(policy.window, Duration::hours(1));
		assert!(!policy.coalesce_issuance);
		assert_eq!(policy.validate(), Ok(()));
	}

	#[test]
	fn validate_rejects_out_of_range_values() {
		assert_eq!(
			CachePolicy::default().with_max_issuances_per_window(0).validate(),
			Err(PolicyError::ZeroIssuanceCap)
		);
		assert_eq!(
			CachePolicy::default().with_window(Duration::ZERO).validate(),
			Err(PolicyError::NonPositiveWindow)
		);
		assert_eq!(
			CachePolicy::default().with_safety_margin(Duration::seconds(-1)).validate(),
			Err(PolicyError::NegativeSafetyMargin)
		);
	}

	#[test]
	fn partial_documents_fall_back_to_defaults() {
		let policy: CachePolicy = serde_json::from_str(r#"{"max_issuances_per_window":3}"#)
			.expect("Partial policy document should deserialize.");

		assert_eq!(policy.max_issuances_per_window, 3);
		assert_eq!(policy.window, CachePolicy::DEFAULT_WINDOW);
		assert_eq!(policy.safety_margin, CachePolicy::DEFAULT_SAFETY_MARGIN);
	}
}
