//! Error classification logic
//!
//! Turns a failed response into a typed [`ApiError`] plus a retry verdict.

use crate::error::ApiError;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

/// Response headers that may carry the server's own request id, in order of preference.
pub(crate) const UPSTREAM_ID_HEADERS: &[&str] = &["x-request-id", "request-id", "x-trace-id"];

/// A classified non-2xx response.
#[derive(Debug, Clone)]
pub struct Classified {
    pub error: ApiError,
}

impl Classified {
    /// Retry verdict, as [`is_retryable`] gives it for the error.
    pub fn retryable(&self) -> bool {
        is_retryable(&self.error)
    }

    pub fn into_error(self) -> crate::Error {
        crate::Error::Api(self.error)
    }
}

/// Statuses worth another attempt: 429 and the whole 5xx range.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Retry verdict for an already-built error.
///
/// The status decides first. A recognized permanent code (quota exceeded,
/// not found, ...) then vetoes a retry the status alone would allow.
pub fn is_retryable(error: &ApiError) -> bool {
    is_retryable_status(error.status) && error.kind.map_or(true, |k| k.retryable())
}

/// Classify a non-2xx response.
///
/// The body is parsed as `{code, message, details}` (flat, or nested under
/// `error`). Anything else becomes an error with an empty code and the raw
/// body text as its message.
pub fn classify(status: u16, headers: &HeaderMap, body: &[u8]) -> Classified {
    let mut error = match parse_error_body(body) {
        Some(parsed) => {
            let message = parsed
                .message
                .unwrap_or_else(|| default_message(status, body));
            let mut e = ApiError::new(status, parsed.code.unwrap_or_default(), message);
            if let Some(details) = parsed.details {
                e = e.with_details(details);
            }
            e
        }
        None => ApiError::new(status, "", default_message(status, body)),
    };

    if let Some(id) = header_first(headers, UPSTREAM_ID_HEADERS) {
        error = error.with_request_id(id);
    }
    error.retry_after = retry_after(headers);

    Classified { error }
}

fn default_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text.to_string()
    }
}

struct ParsedBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<Value>,
}

fn parse_error_body(body: &[u8]) -> Option<ParsedBody> {
    let json: Value = serde_json::from_slice(body).ok()?;
    let obj = json.as_object()?;

    // `{"error": {"code": .., "message": ..}}` envelope
    if let Some(inner) = obj.get("error").and_then(Value::as_object) {
        return Some(ParsedBody {
            code: string_field(inner.get("code")),
            message: string_field(inner.get("message")),
            details: inner.get("details").cloned().filter(|v| !v.is_null()),
        });
    }

    let code = string_field(obj.get("code"));
    let message = string_field(obj.get("message"))
        .or_else(|| string_field(obj.get("error")))
        .or_else(|| string_field(obj.get("detail")));
    if code.is_none() && message.is_none() {
        return None;
    }
    Some(ParsedBody {
        code,
        message,
        details: obj.get("details").cloned().filter(|v| !v.is_null()),
    })
}

fn string_field(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// `Retry-After: <seconds>`. The HTTP-date form is ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = header_first(headers, &["retry-after"])?;
    let secs: u64 = raw.parse().ok()?;
    Some(Duration::from_secs(secs))
}
