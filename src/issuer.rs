//! Client-credentials issuance: the [`TokenIssuer`] seam and its `oauth2`-backed implementation.
//!
//! [`OAuth2Issuer`] posts `grant_type=client_credentials` with `client_id` and `client_secret` in
//! the form body and turns the JSON response into a [`Credential`]. It performs no locking and no
//! caching; every call is exactly one outbound exchange.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
	http::{HeaderValue, header::CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	config::IssuerConfig,
	credential::Credential,
	error::{IssuanceError, ResponseError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestHttpClient};

const JSON: &str = "application/json";

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenIssuer::request_token`].
pub type IssueFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Credential, IssuanceError>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Issuer specialized for the crate's default reqwest transport stack.
pub type ReqwestIssuer = OAuth2Issuer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Performs the network exchange that mints a new credential.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Runs one client-credentials grant against `config`'s token endpoint.
	fn request_token<'a>(&'a self, config: &'a IssuerConfig) -> IssueFuture<'a>;
}

/// Maps HTTP transport failures into [`IssuanceError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> IssuanceError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> IssuanceError {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_timeout() => IssuanceError::TokenEndpoint {
				message: "Request timed out while calling the token endpoint".into(),
				status: meta_status(meta).or_else(|| inner.status().map(|code| code.as_u16())),
				retry_after: meta_retry_after(meta),
			},
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => IssuanceError::Request(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_endpoint_error(meta, message),
			_ => map_endpoint_error(meta, "unrecognized transport failure"),
		}
	}
}

/// [`TokenIssuer`] that drives the `oauth2` crate's client-credentials request over a
/// [`TokenHttpClient`].
pub struct OAuth2Issuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	clock: Arc<dyn Clock>,
}
impl<C, M> OAuth2Issuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an issuer over the provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			error_mapper: mapper.into(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the clock used to stamp `issued_at` and derive `expires_at`.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	fn oauth_client(config: &IssuerConfig) -> ConfiguredBasicClient {
		BasicClient::new(ClientId::new(config.client_id().to_owned()))
			.set_client_secret(ClientSecret::new(config.client_secret().expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(TokenUrl::from_url(config.token_endpoint().clone()))
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2Issuer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an issuer that provisions its own redirect-free reqwest client.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(ReqwestHttpClient::new()?, ReqwestTransportErrorMapper))
	}
}
impl<C, M> TokenIssuer for OAuth2Issuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn request_token<'a>(&'a self, config: &'a IssuerConfig) -> IssueFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = JsonSuccessBodies(self.http_client.with_metadata(meta.clone()));
			let oauth_client = Self::oauth_client(config);
			let result = oauth_client.exchange_client_credentials().request_async(&handle).await;
			let metadata = meta.take();
			let response = match result {
				Ok(response) => response,
				// `oauth2` only accepts 200; other 2xx bodies arrive here as failed error bodies.
				Err(RequestTokenError::Parse(_, body))
					if metadata.as_ref().is_some_and(ResponseMetadata::is_success) =>
					parse_token_body(&body, metadata.as_ref())?,
				Err(err) =>
					return Err(map_request_error(metadata, err, self.error_mapper.as_ref())),
			};

			map_token_response(response, self.clock.now())
		})
	}
}
impl<C, M> Debug for OAuth2Issuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OAuth2Issuer(..)")
	}
}

/// Handle wrapper that labels every 2xx body as JSON.
///
/// `oauth2` rejects success responses whose `Content-Type` is not `application/json`; token
/// endpoints are judged by status and body alone.
struct JsonSuccessBodies<H>(H);
impl<'c, H> AsyncHttpClient<'c> for JsonSuccessBodies<H>
where
	H: for<'h> AsyncHttpClient<'h, Error: Send, Future: 'h + Send>,
{
	type Error = <H as AsyncHttpClient<'c>>::Error;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let pending = self.0.call(request);

		Box::pin(async move {
			let mut response = pending.await?;

			if response.status().is_success() {
				response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
			}

			Ok(response)
		})
	}
}

/// Renders the endpoint's `token_type` as an `Authorization` scheme.
///
/// `bearer` (any case) becomes `Bearer` and `mac` becomes `MAC`; other types are kept verbatim.
pub fn authorization_scheme(token_type: &str) -> String {
	if token_type.eq_ignore_ascii_case("bearer") {
		"Bearer".into()
	} else if token_type.eq_ignore_ascii_case("mac") {
		"MAC".into()
	} else {
		token_type.to_owned()
	}
}

fn map_token_response(
	response: BasicTokenResponse,
	issued_at: OffsetDateTime,
) -> Result<Credential, IssuanceError> {
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(ResponseError::EmptyAccessToken.into());
	}

	let expires_in = response.expires_in().ok_or(ResponseError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ResponseError::ExpiresInOutOfRange)?;
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ResponseError::ExpiresInOutOfRange)?;

	Ok(Credential::new(
		access_token.to_owned(),
		authorization_scheme(response.token_type().as_ref()),
		issued_at,
		expires_at,
	))
}

fn parse_token_body(
	body: &[u8],
	meta: Option<&ResponseMetadata>,
) -> Result<BasicTokenResponse, IssuanceError> {
	serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body))
		.map_err(|source| IssuanceError::TokenResponseParse { source, status: meta_status(meta) })
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> IssuanceError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(source, _body) => match meta_ref {
			Some(meta) if meta.status.is_some() && !meta.is_success() =>
				map_endpoint_error(meta_ref, "response carried no OAuth error body"),
			_ => IssuanceError::TokenResponseParse { source, status: meta_status(meta_ref) },
		},
		RequestTokenError::Other(message) => IssuanceError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		},
	}
}

fn map_server_response(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> IssuanceError {
	IssuanceError::Rejected {
		error: response.error().as_ref().to_owned(),
		description: response.error_description().cloned(),
		status: meta_status(meta),
	}
}

fn map_endpoint_error(meta: Option<&ResponseMetadata>, message: impl Display) -> IssuanceError {
	let message = match meta_status(meta) {
		Some(status) => format!("HTTP {status}: {message}"),
		None => message.to_string(),
	};

	IssuanceError::TokenEndpoint {
		message,
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
