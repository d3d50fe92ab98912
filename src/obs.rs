//! Observability hooks for issuance attempts.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to run every issuance inside an `oauth2_token_cache.issue`
//!   span carrying the `stage` field, and to emit cache hit, issuance, denial, and failure events.
//! - Enable `metrics` to increment the `oauth2_token_cache_issuance_total` counter for every
//!   attempt/success/failure/denial, labeled by `outcome`.
//!
//! Access tokens and client secrets are never recorded.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each slow-path call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssuanceOutcome {
	/// A rate-limit slot was reserved and the issuer is about to be called.
	Attempt,
	/// The issuer returned a credential.
	Success,
	/// The issuer failed; the reservation was released.
	Failure,
	/// The rate limiter denied the reservation.
	RateLimited,
}
impl IssuanceOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			IssuanceOutcome::Attempt => "attempt",
			IssuanceOutcome::Success => "success",
			IssuanceOutcome::Failure => "failure",
			IssuanceOutcome::RateLimited => "rate_limited",
		}
	}
}
impl Display for IssuanceOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
