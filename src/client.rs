//! Shared client for the Dify HTTP API.
//!
//! Keep the public surface small and predictable: [`Client::execute`] for
//! unary calls, [`Client::stream`] for server-sent event streams. Retry,
//! classification and telemetry live in the submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod error_classification;
mod execution;
mod policy;
pub mod types;

pub use builder::ClientBuilder;
pub use self::core::Client;
pub use error_classification::{classify, Classified};
pub use types::CallStats;
