//! Streaming chat example
//!
//! Sends one chat message in streaming mode and prints the answer as it
//! arrives. Ctrl-C cancels the stream.
//!
//! Usage:
//!   DIFY_API_KEY="app-..." cargo run --example chat_stream -- "What is Dify?"

use anyhow::Context;
use dify_client::pipeline::JsonHandler;
use dify_client::{CancellationToken, Client, ClientSettings, LogicalRequest};
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// The fields of a chat stream event this demo cares about.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello! What can you do?".to_string());

    let config = ClientSettings::from_env()?.to_transport_config()?;
    let client = Client::new(config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let req = LogicalRequest::post("/chat-messages")
        .json_value(json!({
            "inputs": {},
            "query": query,
            "response_mode": "streaming",
            "user": "demo-user",
        }))
        .streaming();

    let mut conversation = None;
    let mut handler = JsonHandler::new(|event: &str, chunk: ChatChunk| {
        match event {
            "message" | "agent_message" => {
                print!("{}", chunk.answer);
                let _ = std::io::stdout().flush();
            }
            "message_end" => conversation = chunk.conversation_id,
            _ => {}
        }
        Ok(())
    });

    let result = client.stream(&req, &mut handler, &cancel).await;
    drop(handler);
    println!();
    result.context("chat stream failed")?;

    if let Some(id) = conversation {
        println!("conversation: {}", id);
    }
    Ok(())
}
