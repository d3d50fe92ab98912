//! Immutable bearer credential records and their freshness rules.

pub mod secret;

pub use secret::TokenSecret;

// self
use crate::_prelude::*;

/// Freshness of a credential relative to an instant and a safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Usable: the instant is strictly before `expires_at - safety_margin`.
	Valid,
	/// Inside the safety margin but not yet expired; must be refreshed before use.
	Stale,
	/// At or past `expires_at`.
	Expired,
}

/// Access token issued by the token endpoint, together with its type and expiry.
///
/// Records are replaced as a whole on every refresh and never mutated in place, so the token
/// type and the token value read from one record always belong to the same issuance.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the endpoint, used as the `Authorization` scheme.
	///
	/// [`OAuth2Issuer`](crate::issuer::OAuth2Issuer) stores registered types in their canonical
	/// case, so a `bearer` response becomes `Bearer` and `mac` becomes `MAC`; extension types are
	/// kept exactly as received.
	pub token_type: String,
	/// Instant the issuer received the token.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry derived from `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential record.
	pub fn new(
		access_token: impl Into<String>,
		token_type: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			token_type: token_type.into(),
			issued_at,
			expires_at,
		}
	}

	/// Instant from which the credential must no longer be served.
	pub fn refresh_at(&self, safety_margin: Duration) -> OffsetDateTime {
		self.expires_at.checked_sub(safety_margin).unwrap_or(self.expires_at)
	}

	/// Computes the freshness status at `instant`.
	pub fn status_at(&self, instant: OffsetDateTime, safety_margin: Duration) -> CredentialStatus {
		if instant >= self.expires_at {
			return CredentialStatus::Expired;
		}
		if instant >= self.refresh_at(safety_margin) {
			return CredentialStatus::Stale;
		}

		CredentialStatus::Valid
	}

	/// Returns `true` when the credential can be served at `instant`.
	pub fn is_usable_at(&self, instant: OffsetDateTime, safety_margin: Duration) -> bool {
		matches!(self.status_at(instant, safety_margin), CredentialStatus::Valid)
	}

	/// Renders the `Authorization` header value, `"{token_type} {access_token}"`.
	pub fn authorization_header(&self) -> String {
		format!("{} {}", self.token_type, self.access_token.expose())
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
