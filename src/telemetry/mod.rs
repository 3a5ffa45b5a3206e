//! 遥测模块：以注入方式提供调用与重试记录，替代进程级全局单例。
//!
//! Telemetry sinks.
//!
//! The client reports one [`TelemetryEvent::Attempt`] per network attempt and
//! one [`TelemetryEvent::Call`] per logical call to the sink it was built
//! with. There is no process-wide sink: tests hand the builder an
//! [`InMemoryTelemetrySink`], applications pick whatever fits.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TelemetrySink`] | Trait for telemetry destinations |
//! | [`NoopTelemetrySink`] | Default sink (drops everything) |
//! | [`InMemoryTelemetrySink`] | Bounded in-memory sink for tests |
//! | [`TracingTelemetrySink`] | Emits records as `tracing` events |
//! | [`CompositeTelemetrySink`] | Fans out to several sinks |

use crate::client::CallStats;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Outcome of one network attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub client_request_id: String,
    /// 0-based attempt number within the call.
    pub attempt: u32,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub will_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Attempt(AttemptRecord),
    Call(CallStats),
}

impl TelemetryEvent {
    pub fn client_request_id(&self) -> &str {
        match self {
            TelemetryEvent::Attempt(a) => &a.client_request_id,
            TelemetryEvent::Call(c) => &c.client_request_id,
        }
    }
}

/// Destination for telemetry events.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn report(&self, event: TelemetryEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Drops everything.
pub struct NoopTelemetrySink;

#[async_trait]
impl TelemetrySink for NoopTelemetrySink {
    async fn report(&self, _event: TelemetryEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn TelemetrySink> {
    Arc::new(NoopTelemetrySink)
}

/// In-memory sink for testing. Keeps the newest `max_events` events.
pub struct InMemoryTelemetrySink {
    events: RwLock<VecDeque<TelemetryEvent>>,
    max_events: usize,
}

impl InMemoryTelemetrySink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Attempt(a) => Some(a),
                TelemetryEvent::Call(_) => None,
            })
            .collect()
    }

    pub fn calls(&self) -> Vec<CallStats> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Call(c) => Some(c),
                TelemetryEvent::Attempt(_) => None,
            })
            .collect()
    }

    pub fn events_for_request(&self, client_request_id: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.client_request_id() == client_request_id)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TelemetrySink for InMemoryTelemetrySink {
    async fn report(&self, event: TelemetryEvent) -> Result<()> {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }
}

/// Emits every record as an `info` event on the `dify_client::telemetry` target.
#[derive(Default)]
pub struct TracingTelemetrySink;

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn report(&self, event: TelemetryEvent) -> Result<()> {
        match event {
            TelemetryEvent::Attempt(a) => info!(
                target: "dify_client::telemetry",
                request_id = a.client_request_id.as_str(),
                attempt = a.attempt,
                method = a.method.as_str(),
                path = a.path.as_str(),
                http_status = a.http_status,
                duration_ms = a.duration_ms,
                error = a.error.as_deref(),
                will_retry = a.will_retry,
                "attempt finished"
            ),
            TelemetryEvent::Call(c) => info!(
                target: "dify_client::telemetry",
                request_id = c.client_request_id.as_str(),
                method = c.method.as_str(),
                path = c.path.as_str(),
                http_status = c.http_status,
                attempts = c.attempts,
                duration_ms = c.duration_ms,
                streaming = c.streaming,
                events = c.events_delivered,
                succeeded = c.succeeded,
                "call finished"
            ),
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations. Failures of one sink do not
/// stop delivery to the others.
#[derive(Default)]
pub struct CompositeTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl CompositeTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl TelemetrySink for CompositeTelemetrySink {
    async fn report(&self, event: TelemetryEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.report(event.clone()).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(id: &str, n: u32) -> TelemetryEvent {
        TelemetryEvent::Attempt(AttemptRecord {
            client_request_id: id.to_string(),
            attempt: n,
            method: "POST".into(),
            path: "/chat-messages".into(),
            http_status: Some(503),
            duration_ms: 3,
            error: None,
            will_retry: true,
        })
    }

    #[tokio::test]
    async fn in_memory_sink_is_bounded() {
        let sink = InMemoryTelemetrySink::new(2);
        for n in 0..3 {
            sink.report(attempt("r1", n)).await.unwrap();
        }
        let attempts = sink.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].attempt, 1);
        assert_eq!(attempts[1].attempt, 2);

        for n in 3..10 {
            sink.report(attempt("r2", n)).await.unwrap();
        }
        assert_eq!(sink.len(), 2);
        let newest: Vec<u32> = sink.attempts().iter().map(|a| a.attempt).collect();
        assert_eq!(newest, vec![8, 9]);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn composite_fans_out() {
        let a = Arc::new(InMemoryTelemetrySink::new(10));
        let b = Arc::new(InMemoryTelemetrySink::new(10));
        let composite = CompositeTelemetrySink::new()
            .add_sink(a.clone())
            .add_sink(b.clone());
        composite.report(attempt("r1", 0)).await.unwrap();
        composite.report(attempt("r2", 0)).await.unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.events_for_request("r2").len(), 1);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(attempt("r1", 0)).unwrap();
        assert_eq!(json["type"], "attempt");
        assert_eq!(json["http_status"], 503);
        assert!(json.get("error").is_none());
    }
}
