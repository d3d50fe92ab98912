//! Demonstrates serving one cached client-credentials token to several callers with the default
//! reqwest transport.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_cache::{
	cache::TokenCache,
	config::{CachePolicy, IssuerConfig},
	http::ReqwestHttpClient,
	issuer::{ReqwestIssuer, ReqwestTransportErrorMapper},
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let config = IssuerConfig::new(&server.url("/token"), "demo-client", "super-secret")?;
	// httpmock serves a self-signed certificate; production clients keep verification on.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let issuer = ReqwestIssuer::with_http_client(http_client, ReqwestTransportErrorMapper);
	let cache = TokenCache::builder(config, Arc::new(issuer))
		.policy(CachePolicy::default().with_coalesced_issuance(true))
		.build()?;
	let callers = (0..4)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.authorization_header().await })
		})
		.collect::<Vec<_>>();

	for caller in callers {
		println!("Authorization: {}.", caller.await??);
	}

	println!("Issuances this window: {}.", cache.rate_limit_window().count);

	token_mock.assert_async().await;

	Ok(())
}
