//! Basic usage example
//!
//! Fetches an app's parameters with a unary call and prints the call summary.
//!
//! Settings come from the environment:
//! - DIFY_API_KEY (required), DIFY_BASE_URL (optional)
//!
//! Usage:
//!   DIFY_API_KEY="app-..." RUST_LOG=dify_client=debug cargo run --example basic_usage

use anyhow::Context;
use dify_client::telemetry::TracingTelemetrySink;
use dify_client::{CancellationToken, ClientBuilder, ClientSettings, LogicalRequest};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ClientSettings::from_env()?;
    if settings.api_key.is_none() && settings.app_code.is_none() {
        eprintln!("Warning: neither DIFY_API_KEY nor DIFY_APP_CODE is set; the request will be rejected.");
    }

    let client = ClientBuilder::from_settings(&settings)?
        .telemetry_sink(Arc::new(TracingTelemetrySink))
        .build()?;

    let req = LogicalRequest::get("/parameters").query("user", "demo-user");
    let (body, stats) = client
        .execute_with_stats(&req, &CancellationToken::new())
        .await
        .context("fetching app parameters")?;

    let params: serde_json::Value = serde_json::from_slice(&body)?;
    println!("{}", serde_json::to_string_pretty(&params)?);
    println!(
        "\n{} attempt(s), {} ms, request id {}",
        stats.attempts, stats.duration_ms, stats.client_request_id
    );
    Ok(())
}
