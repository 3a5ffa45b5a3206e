//! 请求执行逻辑：带重试、取消与遥测的一元请求和流式请求执行。
//!
//! Request execution: retry loop, cancellation and telemetry around the
//! single-attempt transport.

use crate::client::error_classification::{classify, header_first, UPSTREAM_ID_HEADERS};
use crate::client::policy::Decision;
use crate::client::types::CallStats;
use crate::pipeline::{StreamDriver, StreamHandler};
use crate::telemetry::{AttemptRecord, TelemetryEvent};
use crate::transport::{LogicalRequest, TransportError};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::core::Client;

/// A successful attempt and what it told us about the server side.
struct Attempt<T> {
    value: T,
    status: u16,
    upstream_request_id: Option<String>,
}

impl<T> Attempt<T> {
    fn new(value: T, status: u16, headers: &HeaderMap) -> Self {
        Self {
            value,
            status,
            upstream_request_id: header_first(headers, UPSTREAM_ID_HEADERS),
        }
    }
}

impl Client {
    /// Send a unary request and return the raw 2xx body.
    ///
    /// Transport failures and retryable statuses are retried under the
    /// configured policy; cancellation is honored while an attempt is in
    /// flight and during backoff.
    pub async fn execute(&self, req: &LogicalRequest, cancel: &CancellationToken) -> Result<Bytes> {
        self.execute_with_stats(req, cancel)
            .await
            .map(|(body, _)| body)
    }

    /// Like [`execute`](Client::execute), also returning the call summary.
    pub async fn execute_with_stats(
        &self,
        req: &LogicalRequest,
        cancel: &CancellationToken,
    ) -> Result<(Bytes, CallStats)> {
        let mut stats = self.new_stats(req, false);
        let start = Instant::now();
        let request_id = stats.client_request_id.clone();

        let result = self
            .with_retries(req, &mut stats, cancel, || self.unary_once(req, &request_id))
            .await;

        self.finish(&mut stats, start, result.as_ref().err()).await;
        result.map(|body| (body, stats))
    }

    /// Send a unary request and decode the 2xx body as JSON `T`.
    ///
    /// A body that does not match `T` is a decode error; it is never retried.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        req: &LogicalRequest,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let (body, stats) = self.execute_with_stats(req, cancel).await?;
        serde_json::from_slice(&body).map_err(|e| {
            let mut context = ErrorContext::new()
                .with_field_path(req.path.clone())
                .with_source("execute_json");
            if let Some(status) = stats.http_status {
                context = context.with_status_code(status);
            }
            Error::decode_with_context(format!("unexpected response shape: {}", e), context)
        })
    }

    /// Open a server-sent event stream and drive `handler` with its events.
    ///
    /// Connection failures are retried like unary calls. Once a 2xx response
    /// is obtained nothing is retried. `handler` receives exactly one of
    /// `on_error` / `on_complete`, also when the connection never succeeds.
    pub async fn stream<H>(
        &self,
        req: &LogicalRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        H: StreamHandler + ?Sized,
    {
        let owned;
        let req = if req.stream {
            req
        } else {
            owned = req.clone().streaming();
            &owned
        };

        let mut stats = self.new_stats(req, true);
        let start = Instant::now();
        let request_id = stats.client_request_id.clone();

        let connected = self
            .with_retries(req, &mut stats, cancel, || {
                self.connect_once(req, &request_id)
            })
            .await;

        let resp = match connected {
            Ok(resp) => resp,
            Err(err) => {
                handler.on_error(&err).await;
                self.finish(&mut stats, start, Some(&err)).await;
                return Err(err);
            }
        };

        let body = Box::pin(
            resp.bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e))),
        );
        let mut driver = StreamDriver::new().with_idle_timeout(self.config.stream_idle_timeout);
        let result = driver.run(body, handler, cancel).await;

        stats.events_delivered = driver.events_delivered();
        self.finish(&mut stats, start, result.as_ref().err()).await;
        result
    }

    async fn unary_once(&self, req: &LogicalRequest, request_id: &str) -> Result<Attempt<Bytes>> {
        let outcome = self.transport.send_buffered(req, request_id).await?;
        let status = outcome.status.as_u16();
        if !outcome.status.is_success() {
            return Err(classify(status, &outcome.headers, &outcome.body).into_error());
        }
        debug!(
            request_id,
            http_status = status,
            bytes = outcome.body.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "response body received"
        );
        Ok(Attempt::new(outcome.body, status, &outcome.headers))
    }

    async fn connect_once(
        &self,
        req: &LogicalRequest,
        request_id: &str,
    ) -> Result<Attempt<reqwest::Response>> {
        let resp = self.transport.send_streaming(req, request_id).await?;
        let status = resp.status();
        if !status.is_success() {
            let outcome = self.transport.read_error_body(resp).await?;
            return Err(classify(status.as_u16(), &outcome.headers, &outcome.body).into_error());
        }
        let headers = resp.headers().clone();
        Ok(Attempt::new(resp, status.as_u16(), &headers))
    }

    /// Run `attempt_once` until it succeeds, the policy gives up, or `cancel` fires.
    async fn with_retries<T, F, Fut>(
        &self,
        req: &LogicalRequest,
        stats: &mut CallStats,
        cancel: &CancellationToken,
        mut attempt_once: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        let mut attempt: u32 = 0;
        loop {
            stats.attempts = attempt + 1;
            let attempt_start = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = attempt_once() => r,
            };
            let elapsed_ms = attempt_start.elapsed().as_millis() as u64;

            let err = match outcome {
                Ok(ok) => {
                    stats.http_status = Some(ok.status);
                    stats.upstream_request_id = ok.upstream_request_id;
                    self.report_attempt(stats, attempt, elapsed_ms, None, false)
                        .await;
                    return Ok(ok.value);
                }
                Err(err) => err,
            };

            if let Some(status) = err.status() {
                stats.http_status = Some(status);
            }
            if let Some(id) = err.api().and_then(|a| a.request_id.clone()) {
                stats.upstream_request_id = Some(id);
            }

            let decision = if err.is_cancelled() {
                Decision::Fail
            } else {
                self.policy.decide(&err, attempt, req.retry)
            };
            let will_retry = matches!(decision, Decision::Retry { .. });
            self.report_attempt(stats, attempt, elapsed_ms, Some(&err), will_retry)
                .await;

            let delay = match decision {
                Decision::Fail => return Err(err),
                Decision::Retry { delay } => delay,
            };

            warn!(
                request_id = stats.client_request_id.as_str(),
                path = stats.path.as_str(),
                attempt,
                http_status = err.status(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                return Err(Error::Cancelled);
            }
            attempt += 1;
        }
    }

    fn new_stats(&self, req: &LogicalRequest, streaming: bool) -> CallStats {
        CallStats {
            client_request_id: Uuid::new_v4().to_string(),
            method: req.method.to_string(),
            path: req.path.clone(),
            streaming,
            ..CallStats::default()
        }
    }

    async fn report_attempt(
        &self,
        stats: &CallStats,
        attempt: u32,
        duration_ms: u64,
        error: Option<&Error>,
        will_retry: bool,
    ) {
        self.report(TelemetryEvent::Attempt(AttemptRecord {
            client_request_id: stats.client_request_id.clone(),
            attempt,
            method: stats.method.clone(),
            path: stats.path.clone(),
            http_status: stats.http_status,
            duration_ms,
            error: error.map(|e| e.to_string()),
            will_retry,
        }))
        .await;
    }

    async fn finish(&self, stats: &mut CallStats, start: Instant, error: Option<&Error>) {
        stats.duration_ms = start.elapsed().as_millis() as u64;
        stats.succeeded = error.is_none();
        stats.error_code = error
            .and_then(|e| e.api())
            .map(|api| match api.kind {
                Some(kind) => kind.code().to_string(),
                None => api.code.clone(),
            })
            .filter(|code| !code.is_empty());

        match error {
            None => info!(
                request_id = stats.client_request_id.as_str(),
                method = stats.method.as_str(),
                path = stats.path.as_str(),
                http_status = stats.http_status,
                attempts = stats.attempts,
                duration_ms = stats.duration_ms,
                streaming = stats.streaming,
                events = stats.events_delivered,
                "call finished"
            ),
            Some(err) => info!(
                request_id = stats.client_request_id.as_str(),
                method = stats.method.as_str(),
                path = stats.path.as_str(),
                http_status = stats.http_status,
                attempts = stats.attempts,
                duration_ms = stats.duration_ms,
                streaming = stats.streaming,
                error = %err,
                "call failed"
            ),
        }

        self.report(TelemetryEvent::Call(stats.clone())).await;
    }
}
