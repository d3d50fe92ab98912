//! Authorized polling of a downstream HTTP resource.
//!
//! [`Poller`] fetches the cache's `Authorization` header before every request and attaches it
//! verbatim. The tick loop belongs to the host: [`Poller::tick`] never fails, it reports whether
//! the cycle fetched data or was skipped, and the host simply waits for its next interval.

// crates.io
use reqwest::header::AUTHORIZATION;
// self
use crate::{_prelude::*, cache::TokenCache, clock::Clock, error::ConfigError};

/// Failures of a single poll request.
#[derive(Debug, ThisError)]
pub enum PollError {
	/// No usable credential could be obtained for this cycle.
	#[error("Authorization unavailable: {0}")]
	Token(#[from] Error),
	/// The downstream request failed before a response arrived.
	#[error("Downstream request failed.")]
	Request(#[from] ReqwestError),
}

/// Response returned by a successful poll request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollResponse {
	/// HTTP status of the downstream response.
	pub status: u16,
	/// Response body as text.
	pub body: String,
}

/// What happened during one poll cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
	/// The downstream answered with a success status.
	Fetched(PollResponse),
	/// The downstream answered with a non-success status.
	UpstreamError {
		/// Status code returned by the downstream.
		status: u16,
	},
	/// The cycle was skipped; the next tick tries again.
	Skipped {
		/// Rendered cause.
		reason: String,
		/// Earliest useful retry, when the cause carried one.
		retry_at: Option<OffsetDateTime>,
	},
}

/// Periodic GET caller authorized by a shared [`TokenCache`].
#[derive(Clone, Debug)]
pub struct Poller {
	cache: TokenCache,
	client: ReqwestClient,
	target: Url,
}
impl Poller {
	/// Creates a poller with its own reqwest client.
	pub fn new(cache: TokenCache, target: Url) -> Result<Self, ConfigError> {
		Ok(Self::with_client(cache, ReqwestClient::builder().build()?, target))
	}

	/// Creates a poller over an existing reqwest client.
	pub fn with_client(cache: TokenCache, client: ReqwestClient, target: Url) -> Self {
		Self { cache, client, target }
	}

	/// Resource polled on every cycle.
	pub fn target(&self) -> &Url {
		&self.target
	}

	/// Cache supplying the `Authorization` header.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Issues one authorized GET against the target.
	pub async fn poll_once(&self) -> Result<PollResponse, PollError> {
		let authorization = self.cache.authorization_header().await?;
		let response =
			self.client.get(self.target.clone()).header(AUTHORIZATION, authorization).send().await?;
		let status = response.status().as_u16();
		let body = response.text().await?;

		Ok(PollResponse { status, body })
	}

	/// Runs one cycle, logging and absorbing every failure.
	pub async fn tick(&self) -> PollOutcome {
		match self.poll_once().await {
			Ok(response) if (200..300).contains(&response.status) => PollOutcome::Fetched(response),
			Ok(response) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					status = response.status,
					target = %self.target,
					"Poll returned an error status."
				);

				PollOutcome::UpstreamError { status: response.status }
			},
			Err(e) => {
				let retry_at = match &e {
					PollError::Token(inner) => inner.retry_at(self.cache.clock().now()),
					PollError::Request(_) => None,
				};

				#[cfg(feature = "tracing")]
				tracing::warn!(error = %e, ?retry_at, "Skipping poll cycle.");

				PollOutcome::Skipped { reason: e.to_string(), retry_at }
			},
		}
	}
}
