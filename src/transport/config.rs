use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Header carrying a web-app code for app-code authentication.
pub const APP_CODE_HEADER: &str = "X-App-Code";

/// How each outbound request is authenticated. Exactly one mode per client.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    None,
    /// `Authorization: Bearer <token>` (service API keys, console tokens).
    Bearer(String),
    /// `X-App-Code: <code>` (published web apps).
    AppCode(String),
}

impl AuthMode {
    pub fn bearer(token: impl Into<String>) -> Self {
        AuthMode::Bearer(token.into())
    }

    pub fn app_code(code: impl Into<String>) -> Self {
        AuthMode::AppCode(code.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Bearer(_) => "bearer",
            AuthMode::AppCode(_) => "app_code",
        }
    }
}

// Credentials never reach logs.
impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => f.write_str("None"),
            AuthMode::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            AuthMode::AppCode(_) => f.write_str("AppCode(<redacted>)"),
        }
    }
}

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle connections kept across all hosts.
    pub max_idle_total: usize,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_total: 100,
            max_idle_per_host: 32,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Connection and policy parameters shared by every request of one client.
///
/// Build it once with [`TransportConfig::new`] and the `with_*` methods; the
/// client keeps it behind an `Arc` and never mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// API root, e.g. `https://api.dify.ai/v1`.
    pub base_url: String,
    pub auth: AuthMode,
    /// Bound on one whole unary attempt, and on the connection phase of a stream.
    pub timeout: Duration,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Longest wait for the next chunk of a streaming body. `None` waits indefinitely.
    pub stream_idle_timeout: Option<Duration>,
    pub pool: PoolConfig,
    pub user_agent: String,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthMode::None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            stream_idle_timeout: None,
            pool: PoolConfig::default(),
            user_agent: format!("dify-client-rust/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        self.with_auth(AuthMode::Bearer(key.into()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Exponential backoff seeded by `base` and capped at `max`.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = Some(timeout);
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Reject values the transport cannot work with.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(self.base_url.clone())
                    .with_source("transport_config"),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("unsupported URL scheme '{}'", url.scheme()),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("transport_config"),
            ));
        }

        let empty_credential = match &self.auth {
            AuthMode::None => false,
            AuthMode::Bearer(v) | AuthMode::AppCode(v) => v.trim().is_empty(),
        };
        if empty_credential {
            return Err(Error::configuration_with_context(
                "credential must not be empty",
                ErrorContext::new()
                    .with_field_path("auth")
                    .with_details(self.auth.name())
                    .with_source("transport_config"),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("timeout")
                    .with_source("transport_config"),
            ));
        }
        if self.backoff_max < self.backoff_base {
            return Err(Error::configuration_with_context(
                "backoff cap is smaller than the base interval",
                ErrorContext::new()
                    .with_field_path("backoff_max")
                    .with_details(format!(
                        "base={:?} max={:?}",
                        self.backoff_base, self.backoff_max
                    ))
                    .with_source("transport_config"),
            ));
        }
        Ok(())
    }

    /// Absolute URL for a path relative to the base address.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_without_doubling_slashes() {
        let cfg = TransportConfig::new("https://api.dify.ai/v1/");
        assert_eq!(
            cfg.url_for("/chat-messages"),
            "https://api.dify.ai/v1/chat-messages"
        );
        assert_eq!(cfg.url_for("files/upload"), "https://api.dify.ai/v1/files/upload");
    }

    #[test]
    fn debug_redacts_credentials() {
        let cfg = TransportConfig::new("https://api.dify.ai/v1").with_api_key("app-secret");
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("app-secret"));
        assert!(rendered.contains("Bearer(<redacted>)"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(TransportConfig::new("not a url").validate().is_err());
        assert!(TransportConfig::new("ftp://host").validate().is_err());
        assert!(TransportConfig::new("http://localhost")
            .with_auth(AuthMode::app_code("  "))
            .validate()
            .is_err());
        assert!(TransportConfig::new("http://localhost")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(TransportConfig::new("http://localhost")
            .with_backoff(Duration::from_secs(5), Duration::from_secs(1))
            .validate()
            .is_err());
        assert!(TransportConfig::new("http://localhost")
            .with_api_key("k")
            .validate()
            .is_ok());
    }
}
