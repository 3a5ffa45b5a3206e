use crate::error_code::ErrorCode;
use crate::transport::TransportError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for decode and configuration failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "settings.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "execute_json", "settings_loader")
    pub source: Option<String>,
    /// HTTP status of the response the error was derived from, if any
    pub status_code: Option<u16>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Typed error returned by the platform for a non-2xx response.
///
/// Two `ApiError`s compare equal when they carry the same machine code: the
/// recognized [`ErrorCode`] when both sides have one, the raw code string
/// otherwise. Message text and status never take part in equality, so a
/// response can be checked against a sentinel with `err == ErrorCode::X`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: u16,
    /// Machine-readable code as sent by the server (may be empty).
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    /// Sentinel recognized from `code`, if the code is in the known table.
    pub kind: Option<ErrorCode>,
    /// Upstream request id (`x-request-id` / `request-id` response header).
    pub request_id: Option<String>,
    /// Server-requested wait before the next attempt (`Retry-After`).
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let kind = ErrorCode::from_api_code(&code);
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            kind,
            request_id: None,
            retry_after: None,
        }
    }

    /// Canonical instance of a sentinel, for comparisons and tests.
    pub fn sentinel(kind: ErrorCode) -> Self {
        Self {
            status: kind.default_status(),
            code: kind.code().to_string(),
            message: kind.description().to_string(),
            details: None,
            kind: Some(kind),
            request_id: None,
            retry_after: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Whether this error is the given sentinel.
    pub fn is(&self, kind: ErrorCode) -> bool {
        self.kind == Some(kind)
    }
}

impl PartialEq for ApiError {
    fn eq(&self, other: &Self) -> bool {
        match (self.kind, other.kind) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.code == other.code,
            _ => false,
        }
    }
}

impl Eq for ApiError {}

impl PartialEq<ErrorCode> for ApiError {
    fn eq(&self, other: &ErrorCode) -> bool {
        self.is(*other)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "HTTP {}: {}", self.status, self.message)
        } else {
            write!(f, "HTTP {} ({}): {}", self.status, self.code, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

/// Unified error type for the transport core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("Stream handler error: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Wrap a stream handler's own failure.
    pub fn handler<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Error::Handler(err.into())
    }

    /// Transient failures a caller may retry as a whole logical operation.
    ///
    /// Transport failures are transient unless the request could not be
    /// built. API errors carry the classifier's verdict. Everything else is
    /// definitive.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(t) => t.is_retryable(),
            Error::Api(api) => crate::client::error_classification::is_retryable(api),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The typed API error, if this is one.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// HTTP status behind this error, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(api) => Some(api.status),
            Error::Decode { context, .. } | Error::Configuration { context, .. } => {
                context.status_code
            }
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Decode { context, .. } | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_compare_by_code_not_message() {
        let a = ApiError::new(400, "invalid_param", "query is required");
        let b = ApiError::new(422, "invalid_param", "something else entirely");
        let c = ApiError::new(400, "app_unavailable", "query is required");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn aliases_compare_equal_to_sentinel() {
        let err = ApiError::new(429, "too_many_requests", "slow down");
        assert_eq!(err, ApiError::sentinel(ErrorCode::RateLimitExceeded));
        assert!(err == ErrorCode::RateLimitExceeded);
    }

    #[test]
    fn unrecognized_codes_compare_by_raw_string() {
        let a = ApiError::new(400, "custom_thing", "x");
        let b = ApiError::new(400, "custom_thing", "y");
        let empty = ApiError::new(502, "", "bad gateway");
        assert_eq!(a, b);
        assert_ne!(a, empty);
    }

    #[test]
    fn display_includes_context() {
        let err = Error::decode_with_context(
            "unexpected response shape",
            ErrorContext::new()
                .with_source("execute_json")
                .with_status_code(200),
        );
        assert_eq!(
            err.to_string(),
            "Decode error: unexpected response shape (source: execute_json, status: 200)"
        );
        assert_eq!(err.status(), Some(200));
        assert!(!err.is_retryable());
    }
}
