use reqwest::Method;
use serde::Serialize;

/// One intended API call, independent of transport concerns.
///
/// Built fresh per call and handed to the client by reference; the executor
/// never mutates it, so the same value is replayed verbatim on every retry.
#[derive(Debug, Clone)]
pub struct LogicalRequest {
    pub method: Method,
    /// Path relative to the configured base address.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub stream: bool,
    /// Automatic retry is allowed. Clear it for operations that are not safe to repeat.
    pub retry: bool,
}

impl LogicalRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            stream: false,
            retry: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> crate::Result<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.json_value(value))
    }

    /// Mark the call as a `text/event-stream` request.
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_keeps_query_order() {
        let req = LogicalRequest::get("/messages")
            .query("user", "abc-123")
            .query("conversation_id", "c1")
            .query("limit", "20");
        let keys: Vec<_> = req.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["user", "conversation_id", "limit"]);
        assert!(req.retry);
        assert!(!req.stream);
    }

    #[test]
    fn json_body_serializes_structs() {
        #[derive(Serialize)]
        struct Payload<'a> {
            query: &'a str,
            user: &'a str,
        }
        let req = LogicalRequest::post("/chat-messages")
            .json(&Payload {
                query: "hi",
                user: "u1",
            })
            .unwrap()
            .streaming()
            .no_retry();
        assert_eq!(req.body, Some(json!({"query": "hi", "user": "u1"})));
        assert!(req.stream);
        assert!(!req.retry);
    }
}
