//! Core type definitions shared by the transport and the streaming pipeline.

pub mod events;

pub use events::SseEvent;
