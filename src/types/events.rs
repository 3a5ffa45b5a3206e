//! Server-Sent Events as delivered to stream handlers

use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One blank-line-terminated block of a `text/event-stream` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// `event:` field, `"message"` when the block did not name one.
    pub event: String,
    /// All `data:` lines of the block joined with `\n`.
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reconnection hint in milliseconds (`retry:` field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Shorthand for an unnamed (`message`) event.
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT_TYPE, data)
    }

    /// Decode the data payload as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.data)
    }
}
