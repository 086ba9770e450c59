//! HTTP clients for the control plane.
//!
//! | Client | Protocol |
//! |--------|----------|
//! | [`RuntimeClient`] | Invocation fetch and result reporting |
//! | [`ExtensionsClient`] | Extension registration and lifecycle events |
//!
//! Neither client retries. Every transport failure surfaces as a
//! [`TransportError`] and the caller decides whether it is fatal.

pub mod extensions;
pub mod runtime;

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

pub use extensions::ExtensionsClient;
pub use ferrule_types;
pub use runtime::RuntimeClient;

/// Identifying user agent sent with every request.
pub const USER_AGENT: &str = concat!("ferrule/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 4;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned unexpected status {status}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("{operation} response is missing the {header} header")]
    MissingHeader {
        operation: &'static str,
        header: &'static str,
    },
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl TransportError {
    pub(crate) fn request(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Request { operation, source }
    }
}

/// Shared client settings.
///
/// No request timeout: `next` calls are long polls held open by the control
/// plane until work arrives.
fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(None)
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, TransportError> {
    client_builder().build().map_err(TransportError::ClientBuild)
}

/// Header value as a string. Absent and non-UTF-8 values read as `None`.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Read and discard the rest of a response body.
///
/// Failures are logged; they never change the outcome of the request.
pub(crate) async fn drain_body(response: reqwest::Response, operation: &'static str) {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if let Err(e) = chunk {
            tracing::warn!(operation, error = %e, "failed to drain response body");
            return;
        }
    }
}
