//! Mock HTTP server setup for integration tests

#![allow(dead_code)]

use dify_client::telemetry::InMemoryTelemetrySink;
use dify_client::{Client, ClientBuilder, TransportConfig};
use mockito::{Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;

/// Test fixture that owns a mock server and builds clients pointed at it.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Config with short backoff so retry tests stay fast.
    pub fn config(&self) -> TransportConfig {
        TransportConfig::new(self.base_url.clone())
            .with_api_key("app-test-key")
            .with_timeout(Duration::from_secs(5))
            .with_backoff(Duration::from_millis(5), Duration::from_millis(20))
    }

    pub fn client(&self) -> Client {
        Client::new(self.config()).expect("valid test config")
    }

    /// Client plus the in-memory sink it reports to.
    pub fn client_with_telemetry(
        &self,
        config: TransportConfig,
    ) -> (Client, Arc<InMemoryTelemetrySink>) {
        let sink = Arc::new(InMemoryTelemetrySink::new(256));
        let client = ClientBuilder::new(config)
            .telemetry_sink(sink.clone())
            .build()
            .expect("valid test config");
        (client, sink)
    }
}

/// Render `(event, data)` pairs as a `text/event-stream` body.
pub fn sse_body(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| {
            if event.is_empty() {
                format!("data: {}\n\n", data)
            } else {
                format!("event: {}\ndata: {}\n\n", event, data)
            }
        })
        .collect()
}
