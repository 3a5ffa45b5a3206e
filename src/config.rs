//! Client settings loaded from YAML or the environment.
//!
//! The transport core only ever sees a [`TransportConfig`]; this layer is
//! where files and `DIFY_*` variables are read.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DIFY_BASE_URL` | `base_url` |
//! | `DIFY_API_KEY` | `api_key` (bearer auth) |
//! | `DIFY_APP_CODE` | `app_code` (`X-App-Code` auth) |
//! | `DIFY_TIMEOUT_SECS` | `timeout_secs` |
//! | `DIFY_MAX_RETRIES` | `max_retries` |
//! | `DIFY_BACKOFF_BASE_MS` | `backoff_base_ms` |
//! | `DIFY_BACKOFF_MAX_MS` | `backoff_max_ms` |
//! | `DIFY_STREAM_IDLE_TIMEOUT_SECS` | `stream_idle_timeout_secs` |

use crate::transport::{AuthMode, PoolConfig, TransportConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub max_idle_total: Option<usize>,
    pub max_idle_per_host: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
}

/// Plain, serializable client settings. Unset fields keep the transport defaults.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub app_code: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub pool: PoolSettings,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("app_code", &self.app_code.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .field("stream_idle_timeout_secs", &self.stream_idle_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("pool", &self.pool)
            .finish()
    }
}

impl ClientSettings {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid settings: {}", e),
                ErrorContext::new().with_source("yaml"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read settings file: {}", e),
                ErrorContext::new().with_details(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Read `DIFY_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `DIFY_*` variables through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            base_url: get("DIFY_BASE_URL"),
            api_key: get("DIFY_API_KEY"),
            app_code: get("DIFY_APP_CODE"),
            timeout_secs: parse_var("DIFY_TIMEOUT_SECS", get("DIFY_TIMEOUT_SECS"))?,
            max_retries: parse_var("DIFY_MAX_RETRIES", get("DIFY_MAX_RETRIES"))?,
            backoff_base_ms: parse_var("DIFY_BACKOFF_BASE_MS", get("DIFY_BACKOFF_BASE_MS"))?,
            backoff_max_ms: parse_var("DIFY_BACKOFF_MAX_MS", get("DIFY_BACKOFF_MAX_MS"))?,
            stream_idle_timeout_secs: parse_var(
                "DIFY_STREAM_IDLE_TIMEOUT_SECS",
                get("DIFY_STREAM_IDLE_TIMEOUT_SECS"),
            )?,
            user_agent: get("DIFY_USER_AGENT"),
            pool: PoolSettings::default(),
        })
    }

    /// Fields set in `other` win.
    pub fn merge(self, other: ClientSettings) -> Self {
        Self {
            base_url: other.base_url.or(self.base_url),
            api_key: other.api_key.or(self.api_key),
            app_code: other.app_code.or(self.app_code),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            max_retries: other.max_retries.or(self.max_retries),
            backoff_base_ms: other.backoff_base_ms.or(self.backoff_base_ms),
            backoff_max_ms: other.backoff_max_ms.or(self.backoff_max_ms),
            stream_idle_timeout_secs: other
                .stream_idle_timeout_secs
                .or(self.stream_idle_timeout_secs),
            user_agent: other.user_agent.or(self.user_agent),
            pool: PoolSettings {
                max_idle_total: other.pool.max_idle_total.or(self.pool.max_idle_total),
                max_idle_per_host: other.pool.max_idle_per_host.or(self.pool.max_idle_per_host),
                idle_timeout_secs: other.pool.idle_timeout_secs.or(self.pool.idle_timeout_secs),
            },
        }
    }

    /// Build and validate the transport configuration.
    pub fn to_transport_config(&self) -> Result<TransportConfig> {
        let auth = match (&self.api_key, &self.app_code) {
            (Some(_), Some(_)) => {
                return Err(Error::configuration_with_context(
                    "api_key and app_code are mutually exclusive",
                    ErrorContext::new().with_field_path("auth"),
                ))
            }
            (Some(key), None) => AuthMode::bearer(key.clone()),
            (None, Some(code)) => AuthMode::app_code(code.clone()),
            (None, None) => AuthMode::None,
        };

        let mut config = TransportConfig::new(
            self.base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )
        .with_auth(auth);

        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(n) = self.max_retries {
            config = config.with_max_retries(n);
        }
        let base = self
            .backoff_base_ms
            .map(Duration::from_millis)
            .unwrap_or(config.backoff_base);
        let max = self
            .backoff_max_ms
            .map(Duration::from_millis)
            .unwrap_or(config.backoff_max);
        config = config.with_backoff(base, max);
        if let Some(secs) = self.stream_idle_timeout_secs {
            config = config.with_stream_idle_timeout(Duration::from_secs(secs));
        }
        if let Some(ua) = &self.user_agent {
            config = config.with_user_agent(ua.clone());
        }

        let defaults = PoolConfig::default();
        config = config.with_pool(PoolConfig {
            max_idle_total: self.pool.max_idle_total.unwrap_or(defaults.max_idle_total),
            max_idle_per_host: self
                .pool
                .max_idle_per_host
                .unwrap_or(defaults.max_idle_per_host),
            idle_timeout: self
                .pool
                .idle_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
        });

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(v) => v.trim().parse().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("{} is not a valid number", key),
                ErrorContext::new().with_field_path(key).with_details(v),
            )
        }),
    }
}
