use crate::transport::config::APP_CODE_HEADER;
use crate::transport::{AuthMode, LogicalRequest, TransportConfig, TransportError};
use crate::Result;
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Correlation id we attach to every attempt of one logical call.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Everything one buffered attempt produced.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
}

/// Single-attempt HTTP sender. Retry and classification live one layer up.
pub struct HttpTransport {
    client: reqwest::Client,
    config: Arc<TransportConfig>,
}

impl HttpTransport {
    pub fn new(config: Arc<TransportConfig>) -> Result<Self> {
        config.validate()?;

        // reqwest pools per host; the client only ever talks to one host, so
        // the tighter of the two limits is the effective one.
        let idle_per_host = config
            .pool
            .max_idle_per_host
            .min(config.pool.max_idle_total);

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(Some(config.pool.idle_timeout))
            .user_agent(config.user_agent.clone())
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build(&self, req: &LogicalRequest, request_id: &str) -> reqwest::RequestBuilder {
        let url = self.config.url_for(&req.path);
        let mut builder = self.client.request(req.method.clone(), url);

        let auth_header = match &self.config.auth {
            AuthMode::None => None,
            AuthMode::Bearer(token) => {
                builder = builder.bearer_auth(token);
                Some(AUTHORIZATION.as_str())
            }
            AuthMode::AppCode(code) => {
                builder = builder.header(APP_CODE_HEADER, code);
                Some(APP_CODE_HEADER)
            }
        };

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }

        for (name, value) in &req.headers {
            if auth_header.is_some_and(|h| h.eq_ignore_ascii_case(name)) {
                debug!(header = name.as_str(), "ignoring header override of auth header");
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let accept = if req.stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        builder
            .header(ACCEPT, accept)
            .header(REQUEST_ID_HEADER, request_id)
    }

    /// One unary attempt: send and read the whole body under the configured timeout.
    pub async fn send_buffered(
        &self,
        req: &LogicalRequest,
        request_id: &str,
    ) -> std::result::Result<AttemptOutcome, TransportError> {
        let timeout = self.config.timeout;
        let start = Instant::now();
        let resp = self
            .build(req, request_id)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        Ok(AttemptOutcome {
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }

    /// Open a streaming response. Only the connection phase (up to the status
    /// line and headers) is bounded by the configured timeout.
    pub async fn send_streaming(
        &self,
        req: &LogicalRequest,
        request_id: &str,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.build(req, request_id).send()).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(TransportError::from_reqwest(e, timeout)),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Read the rest of a (failed) streaming response so it can be classified.
    pub async fn read_error_body(
        &self,
        resp: reqwest::Response,
    ) -> std::result::Result<AttemptOutcome, TransportError> {
        let timeout = self.config.timeout;
        let start = Instant::now();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = match tokio::time::timeout(timeout, resp.bytes()).await {
            Ok(Ok(b)) => b,
            Ok(Err(e)) => return Err(TransportError::from_reqwest(e, timeout)),
            Err(_) => return Err(TransportError::Timeout(timeout)),
        };
        Ok(AttemptOutcome {
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }
}
