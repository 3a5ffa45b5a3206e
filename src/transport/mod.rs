//! HTTP transport: immutable connection settings, logical requests and the
//! single-attempt sender every domain client goes through.

pub mod config;
pub mod http;
pub mod request;

pub use config::{AuthMode, PoolConfig, TransportConfig};
pub use http::HttpTransport;
pub use request::LogicalRequest;

use std::time::Duration;

/// Failure below the HTTP status line: DNS, connect, TLS, timeout or a broken body.
///
/// [`TransportError::InvalidRequest`] is the exception: the request could not
/// be built at all (bad header value, unparseable URL) and never left the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Classify a reqwest error. Timeouts surface as [`TransportError::Timeout`],
    /// request construction failures as [`TransportError::InvalidRequest`].
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Http(err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Http(e) => e.is_timeout(),
            TransportError::InvalidRequest(_) | TransportError::Other(_) => false,
        }
    }

    /// Whether sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}
