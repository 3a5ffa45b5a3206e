use serde::{Deserialize, Serialize};

/// Per-call summary, for logging and telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    /// Id sent as `X-Request-Id` on every attempt of this call.
    pub client_request_id: String,
    /// Id the server reported back, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_request_id: Option<String>,
    pub method: String,
    pub path: String,
    /// Status of the last attempt that got a response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub attempts: u32,
    pub duration_ms: u64,
    pub streaming: bool,
    /// Events handed to the handler (streaming calls only).
    pub events_delivered: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub succeeded: bool,
}

impl CallStats {
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}
