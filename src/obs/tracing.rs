// self
use crate::{
	_prelude::*,
	credential::Credential,
	error::IssuanceError,
	rate_limit::{RequestWindow, RetryDirective},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedIssue<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedIssue<F> = F;

/// Span wrapping one issuance attempt.
#[derive(Clone, Debug)]
pub struct IssueSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl IssueSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oauth2_token_cache.issue", stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedIssue<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn cache_hit(credential: &Credential) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(expires_at = %credential.expires_at, "Serving cached credential.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = credential;
	}
}

pub(crate) fn issuance_started(window: &RequestWindow, limit: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			count = window.count,
			limit,
			resets_at = %window.resets_at,
			"Requesting a new token."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (window, limit);
	}
}

pub(crate) fn issued(credential: &Credential) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			token_type = %credential.token_type,
			expires_at = %credential.expires_at,
			"Received a new token."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = credential;
	}
}

pub(crate) fn superseded(credential: &Credential) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			expires_at = %credential.expires_at,
			"Kept the cached credential; it outlives the one just issued."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = credential;
	}
}

pub(crate) fn rate_limited(directive: &RetryDirective, limit: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			limit,
			retry_at = %directive.earliest_retry_at,
			"Token issuance limit reached for this window."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (directive, limit);
	}
}

pub(crate) fn issuance_failed(error: &IssuanceError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(status = ?error.status(), %error, "Token issuance failed; slot released.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}
