//! Cache-level error types shared across the store, limiter, issuer, and orchestrator.

// self
use crate::{
	_prelude::*,
	config::{IssuerConfigError, PolicyError},
	rate_limit::RetryDirective,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by [`TokenCache`](crate::cache::TokenCache) callers.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The issuance cap for the current window is exhausted; retry after the directive's instant.
	#[error(
		"Token issuance limit of {limit} requests per window reached; retry after {}.",
		.directive.earliest_retry_at
	)]
	RateLimitExceeded {
		/// Maximum number of issuance attempts allowed per window.
		limit: u32,
		/// When the window resets and how long callers should back off.
		directive: RetryDirective,
	},
	/// The issuance attempt failed; its rate-limit reservation was given back.
	#[error("Token issuance failed: {0}")]
	Issuance(#[from] IssuanceError),
	/// Local configuration problem detected at construction time.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when the error was caused by the issuance cap.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimitExceeded { .. })
	}

	/// Earliest instant a retry can succeed, when the error carries one.
	///
	/// Upstream `Retry-After` delays are resolved against `now`, normally the cache's clock.
	pub fn retry_at(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
		match self {
			Self::RateLimitExceeded { directive, .. } => Some(directive.earliest_retry_at),
			Self::Issuance(IssuanceError::TokenEndpoint { retry_after: Some(delay), .. }) =>
				Some(now + *delay),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while assembling a cache.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Issuer configuration is incomplete or invalid.
	#[error(transparent)]
	Issuer(#[from] IssuerConfigError),
	/// Cache policy values are out of range.
	#[error(transparent)]
	Policy(#[from] PolicyError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures of a single client-credentials exchange.
#[derive(Debug, ThisError)]
pub enum IssuanceError {
	/// Token endpoint answered with a well-formed OAuth error response.
	#[error("Token endpoint rejected the grant with `{error}`.")]
	Rejected {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint answered with a non-success status or an unexpected payload.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that does not match the token response shape.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response parsed but violates the credential contract.
	#[error(transparent)]
	InvalidResponse(#[from] ResponseError),
	/// Network or IO failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Outbound HTTP request could not be constructed.
	#[error("Token request could not be constructed.")]
	Request(#[from] oauth2::http::Error),
}
impl IssuanceError {
	/// HTTP status observed for the failing exchange, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::TokenEndpoint { status, .. }
			| Self::TokenResponseParse { status, .. } => *status,
			_ => None,
		}
	}
}

/// Token response fields that parsed but cannot become a credential.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ResponseError {
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an `expires_in` beyond the representable range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned an empty `access_token`.
	#[error("Token endpoint returned an empty access_token.")]
	EmptyAccessToken,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
