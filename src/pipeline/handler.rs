//! Stream handlers: the callback side of a streaming call.

use crate::types::events::SseEvent;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::mpsc;

/// Receiver of one streaming call's events.
///
/// The driver calls `on_event` for every decoded event in arrival order,
/// awaiting each call before reading further, and then exactly one of
/// `on_error` / `on_complete`. Returning an error from `on_event` stops the
/// stream; that same error is then passed to `on_error`.
#[async_trait]
pub trait StreamHandler: Send {
    async fn on_event(&mut self, event: &SseEvent) -> Result<()>;

    async fn on_error(&mut self, _error: &Error) {}

    async fn on_complete(&mut self) {}
}

/// Records everything it is told. Useful in tests and for small scripts.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<SseEvent>,
    /// Rendered errors passed to `on_error`.
    pub errors: Vec<String>,
    pub completions: usize,
    fail_on: Option<(usize, String)>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `message` when the `n`-th event (1-based) arrives.
    pub fn failing_on(n: usize, message: impl Into<String>) -> Self {
        Self {
            fail_on: Some((n, message.into())),
            ..Self::default()
        }
    }

    /// Number of terminal notifications received.
    pub fn terminal_count(&self) -> usize {
        self.errors.len() + self.completions
    }

    pub fn data(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.data.as_str()).collect()
    }
}

#[async_trait]
impl StreamHandler for RecordingHandler {
    async fn on_event(&mut self, event: &SseEvent) -> Result<()> {
        self.events.push(event.clone());
        match &self.fail_on {
            Some((n, message)) if *n == self.events.len() => Err(Error::handler(message.clone())),
            _ => Ok(()),
        }
    }

    async fn on_error(&mut self, error: &Error) {
        self.errors.push(error.to_string());
    }

    async fn on_complete(&mut self) {
        self.completions += 1;
    }
}

/// Decodes each event's data as JSON `T` before handing it to a closure.
///
/// A payload that does not parse as `T` is a decode error and stops the stream.
pub struct JsonHandler<T, F> {
    on_data: F,
    completed: bool,
    error: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> JsonHandler<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(&str, T) -> Result<()> + Send,
{
    /// `on_data` receives the event type and the decoded payload.
    pub fn new(on_data: F) -> Self {
        Self {
            on_data,
            completed: false,
            error: None,
            _marker: PhantomData,
        }
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[async_trait]
impl<T, F> StreamHandler for JsonHandler<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(&str, T) -> Result<()> + Send,
{
    async fn on_event(&mut self, event: &SseEvent) -> Result<()> {
        let value: T = serde_json::from_str(&event.data).map_err(|e| {
            Error::decode_with_context(
                format!("event payload is not the expected JSON shape: {}", e),
                ErrorContext::new()
                    .with_field_path(format!("event.{}", event.event))
                    .with_source("json_handler"),
            )
        })?;
        (self.on_data)(&event.event, value)
    }

    async fn on_error(&mut self, error: &Error) {
        self.error = Some(error.to_string());
    }

    async fn on_complete(&mut self) {
        self.completed = true;
    }
}

/// Item forwarded by [`ChannelHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(SseEvent),
    Error(String),
    Complete,
}

/// Forwards events into a bounded channel.
///
/// Sending waits for capacity, so a slow receiver slows the read loop down
/// instead of growing a buffer. A dropped receiver fails the stream.
pub struct ChannelHandler {
    tx: mpsc::Sender<StreamItem>,
}

impl ChannelHandler {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StreamItem>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StreamHandler for ChannelHandler {
    async fn on_event(&mut self, event: &SseEvent) -> Result<()> {
        self.tx
            .send(StreamItem::Event(event.clone()))
            .await
            .map_err(|_| Error::handler("stream receiver dropped"))
    }

    async fn on_error(&mut self, error: &Error) {
        let _ = self.tx.send(StreamItem::Error(error.to_string())).await;
    }

    async fn on_complete(&mut self) {
        let _ = self.tx.send(StreamItem::Complete).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Chunk {
        answer: String,
    }

    #[tokio::test]
    async fn recording_handler_fails_on_request() {
        let mut h = RecordingHandler::failing_on(2, "boom");
        assert!(h.on_event(&SseEvent::message("1")).await.is_ok());
        let err = h.on_event(&SseEvent::message("2")).await.unwrap_err();
        assert_eq!(err.to_string(), "Stream handler error: boom");
    }

    #[tokio::test]
    async fn json_handler_decodes_payloads() {
        let mut seen = Vec::new();
        {
            let mut h = JsonHandler::new(|event: &str, chunk: Chunk| {
                seen.push((event.to_string(), chunk.answer));
                Ok(())
            });
            h.on_event(&SseEvent::new("message", r#"{"answer":"Hi"}"#))
                .await
                .unwrap();
            let err = h
                .on_event(&SseEvent::new("message", "not json"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Decode { .. }));
            h.on_complete().await;
            assert!(h.completed());
        }
        assert_eq!(seen, vec![("message".to_string(), "Hi".to_string())]);
    }

    #[tokio::test]
    async fn channel_handler_forwards_in_order() {
        let (mut h, mut rx) = ChannelHandler::new(4);
        h.on_event(&SseEvent::message("a")).await.unwrap();
        h.on_event(&SseEvent::message("b")).await.unwrap();
        h.on_complete().await;
        assert_eq!(rx.recv().await, Some(StreamItem::Event(SseEvent::message("a"))));
        assert_eq!(rx.recv().await, Some(StreamItem::Event(SseEvent::message("b"))));
        assert_eq!(rx.recv().await, Some(StreamItem::Complete));

        drop(rx);
        assert!(h.on_event(&SseEvent::message("c")).await.is_err());
    }
}
