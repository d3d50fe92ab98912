//! Issuer configuration (endpoint + client credentials) and cache policy.
//!
//! [`IssuerConfig`] is immutable once built; the builder validates that the token endpoint uses
//! HTTPS (plain HTTP is accepted only for loopback hosts) and that the client identifier and
//! secret are present.

pub mod policy;

pub use policy::*;

// self
use crate::{_prelude::*, credential::TokenSecret};

/// Errors raised while constructing or validating an [`IssuerConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum IssuerConfigError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Token endpoint string is not a valid URL.
	#[error("Token endpoint is not a valid URL.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token endpoint must use HTTPS unless it points at a loopback host.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Client identifier is mandatory and must not be blank.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Client secret is mandatory for the client-credentials grant.
	#[error("Missing client secret.")]
	MissingClientSecret,
}

/// Token endpoint and client credentials used by every issuance.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuerConfig {
	token_endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
}
impl IssuerConfig {
	/// Creates a new builder.
	pub fn builder() -> IssuerConfigBuilder {
		IssuerConfigBuilder::default()
	}

	/// Parses `token_endpoint` and validates the resulting configuration.
	pub fn new(
		token_endpoint: &str,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self, IssuerConfigError> {
		let url = Url::parse(token_endpoint)
			.map_err(|source| IssuerConfigError::InvalidTokenEndpoint { source })?;

		Self::builder()
			.token_endpoint(url)
			.client_id(client_id)
			.client_secret(client_secret)
			.build()
	}

	/// Token endpoint URL.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// OAuth 2.0 client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// OAuth 2.0 client secret; callers must avoid logging it.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}

	fn validate(&self) -> Result<(), IssuerConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(IssuerConfigError::MissingClientId);
		}
		if self.client_secret.is_empty() {
			return Err(IssuerConfigError::MissingClientSecret);
		}

		validate_endpoint(&self.token_endpoint)
	}
}
impl Debug for IssuerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuerConfig")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.finish()
	}
}

/// Builder for [`IssuerConfig`] values.
#[derive(Debug, Default)]
pub struct IssuerConfigBuilder {
	/// Token endpoint used for the client-credentials exchange.
	pub token_endpoint: Option<Url>,
	/// OAuth 2.0 client identifier.
	pub client_id: Option<String>,
	/// OAuth 2.0 client secret.
	pub client_secret: Option<TokenSecret>,
}
impl IssuerConfigBuilder {
	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<IssuerConfig, IssuerConfigError> {
		let config = IssuerConfig {
			token_endpoint: self.token_endpoint.ok_or(IssuerConfigError::MissingTokenEndpoint)?,
			client_id: self.client_id.ok_or(IssuerConfigError::MissingClientId)?,
			client_secret: self.client_secret.ok_or(IssuerConfigError::MissingClientSecret)?,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_endpoint(url: &Url) -> Result<(), IssuerConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(IssuerConfigError::InsecureEndpoint { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
