// self
use crate::obs::IssuanceOutcome;

/// Records an issuance outcome via the global metrics recorder (when enabled).
pub fn record_issuance_outcome(outcome: IssuanceOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_token_cache_issuance_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_issuance_outcome_without_recorder_is_noop() {
		record_issuance_outcome(IssuanceOutcome::RateLimited);
	}
}
