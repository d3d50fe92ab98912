//! Polls a mock order endpoint every second, fetching the `Authorization` header from the token
//! cache before each request. Cycles without a usable token are skipped, never fatal.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_cache::{
	cache::TokenCache,
	config::IssuerConfig,
	http::ReqwestHttpClient,
	issuer::{ReqwestIssuer, ReqwestTransportErrorMapper},
	poll::{PollOutcome, Poller},
	reqwest::Client,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"order-reader\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer order-reader");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":1,\"status\":\"open\"}]");
		})
		.await;

	let config = IssuerConfig::new(&server.url("/token"), "order-client", "order-secret")?;
	// httpmock serves a self-signed certificate; production clients keep verification on.
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let issuer = ReqwestIssuer::with_http_client(
		ReqwestHttpClient::with_client(client.clone()),
		ReqwestTransportErrorMapper,
	);
	let cache = TokenCache::new(config, Arc::new(issuer));
	let poller = Poller::with_client(cache, client, Url::parse(&server.url("/orders"))?);
	let mut interval = tokio::time::interval(Duration::from_secs(1));

	for _ in 0..3 {
		interval.tick().await;

		match poller.tick().await {
			PollOutcome::Fetched(response) => println!("Orders: {}.", response.body),
			PollOutcome::UpstreamError { status } => println!("Order API returned {status}."),
			PollOutcome::Skipped { reason, .. } => println!("Skipped cycle: {reason}."),
		}
	}

	println!("Token issuances: {}.", poller.cache().metrics().successes());

	Ok(())
}
