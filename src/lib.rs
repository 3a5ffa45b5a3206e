//! # dify-client
//!
//! Dify 平台 HTTP API 的传输核心：认证、重试、错误分类与 SSE 流式解码。
//!
//! Transport core for the Dify platform HTTP API. Every domain client (chat,
//! completion, workflow, knowledge base, ...) builds a [`LogicalRequest`] and
//! hands it to one shared [`Client`], which applies authentication, timeouts,
//! retry with exponential backoff, error classification and, for streaming
//! endpoints, server-sent event decoding.
//!
//! ## Key Features
//!
//! - **Unary calls**: [`Client::execute`] returns the raw 2xx body;
//!   [`Client::execute_json`] decodes it
//! - **Streaming**: [`Client::stream`] drives a [`StreamHandler`] with ordered
//!   [`SseEvent`]s and exactly one terminal notification
//! - **Typed errors**: [`ApiError`] with code-based equality against
//!   [`ErrorCode`] sentinels
//! - **Cancellation**: every suspension point races a [`CancellationToken`]
//! - **Telemetry**: an injected [`telemetry::TelemetrySink`], no global state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dify_client::{CancellationToken, Client, LogicalRequest, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> dify_client::Result<()> {
//!     let client = Client::new(
//!         TransportConfig::new("https://api.dify.ai/v1").with_api_key("app-..."),
//!     )?;
//!
//!     let req = LogicalRequest::get("/parameters").query("user", "abc-123");
//!     let params: serde_json::Value = client
//!         .execute_json(&req, &CancellationToken::new())
//!         .await?;
//!     println!("{params}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, builder, retry loop and error classification |
//! | [`transport`] | Connection settings, logical requests, single-attempt sender |
//! | [`pipeline`] | SSE decoder, stream driver and handlers |
//! | [`types`] | Event types |
//! | [`error`] / [`error_code`] | Error taxonomy and sentinel codes |
//! | [`config`] | Settings from YAML or `DIFY_*` environment variables |
//! | [`telemetry`] | Injected telemetry sinks |

pub mod client;
pub mod config;
pub mod error;
pub mod error_code;
pub mod pipeline;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{CallStats, Client, ClientBuilder};
pub use config::ClientSettings;
pub use error::{ApiError, Error, ErrorContext};
pub use error_code::ErrorCode;
pub use pipeline::StreamHandler;
pub use tokio_util::sync::CancellationToken;
pub use transport::{AuthMode, LogicalRequest, PoolConfig, TransportConfig, TransportError};
pub use types::SseEvent;

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
