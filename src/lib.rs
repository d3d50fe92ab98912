//! Thread-safe OAuth 2.0 client-credentials token cache that serves one shared bearer credential
//! to any number of concurrent callers while enforcing a hard cap on issuance requests per window.
//!
//! The crate is organized leaf first:
//!
//! - [`store::TokenStore`] keeps the single live [`credential::Credential`].
//! - [`rate_limit::RateLimiter`] reserves issuance slots inside a rolling window.
//! - [`issuer::TokenIssuer`] performs the client-credentials exchange ([`issuer::OAuth2Issuer`] is
//!   the default implementation built on the `oauth2` crate).
//! - [`cache::TokenCache`] composes the three with a decide/issue/commit split so no lock is held
//!   across network I/O.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod issuer;
pub mod obs;
#[cfg(feature = "reqwest")] pub mod poll;
pub mod rate_limit;
pub mod store;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
