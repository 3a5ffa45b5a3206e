//! 流式处理模块：将 SSE 响应体解码为事件并按序交付给处理器。
//!
//! # Streaming Pipeline
//!
//! Turns a live `text/event-stream` body into discrete events and drives a
//! caller-supplied handler with them.
//!
//! ```text
//! HTTP body chunks → SseDecoder → SseEvent → StreamHandler::on_event
//!                                          ↘ on_error | on_complete (exactly one)
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Incremental SSE framing ([`SseDecoder`], [`decode_stream`]) |
//! | [`driver`] | Read loop with ordering, error and cancellation semantics |
//! | [`handler`] | The [`StreamHandler`] trait and stock handlers |
//!
//! ## Example
//!
//! ```rust
//! use dify_client::pipeline::SseDecoder;
//!
//! let mut decoder = SseDecoder::new();
//! assert_eq!(decoder.feed(b"event: message\ndata: {\"a\"").count(), 0);
//! let events: Vec<_> = decoder.feed(b":1}\n\n").collect();
//! assert_eq!(events[0].event, "message");
//! assert_eq!(events[0].data, "{\"a\":1}");
//! ```

pub mod decode;
pub mod driver;
pub mod handler;

pub use decode::{decode_stream, Remainder, SseDecoder};
pub use driver::StreamDriver;
pub use handler::{ChannelHandler, JsonHandler, RecordingHandler, StreamHandler, StreamItem};
