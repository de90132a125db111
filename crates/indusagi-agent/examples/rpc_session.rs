//! Interactive session against a local agent
//!
//! Reads prompts from stdin, prints streamed answers and tool activity.
//! Configure with `INDUSAGI_PATH`, `INDUSAGI_PROVIDER`, `INDUSAGI_MODEL`
//! and `RUST_LOG`.
//!
//! ```text
//! cargo run -p indusagi-agent --example rpc_session
//! ```

use anyhow::Context;
use indusagi_agent::{AgentClient, AgentConfig, AgentEvent, SessionHistoryStore, ToolEvent};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    let history = Arc::new(SessionHistoryStore::new(config.history_limit));
    let (client, mut events) = AgentClient::new(config, history.clone())?;

    client.start().await.context("failed to start the agent")?;
    let state = client.get_state().await?;
    println!(
        "model: {}  thinking: {}",
        state.model.as_ref().map_or("-", |m| m.id()),
        state.thinking_level.as_deref().unwrap_or("-"),
    );

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::StreamChunk { text } => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                AgentEvent::MessageComplete { .. } => println!(),
                AgentEvent::ToolEvent(ToolEvent {
                    phase, tool_name, ..
                }) => eprintln!("[tool {tool_name} {phase:?}]"),
                AgentEvent::SessionChanged { path } => eprintln!("[session {path}]"),
                AgentEvent::ProcessExited { code } => {
                    eprintln!("[agent exited: {code:?}]");
                }
                AgentEvent::StateChanged(_) => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/stats" => {
                let stats = client.get_session_stats().await?;
                println!(
                    "{} messages, {} tokens, ${:.4}",
                    stats.total_messages, stats.tokens.total, stats.cost
                );
            }
            "/sessions" => {
                for entry in history.entries() {
                    println!("{}  {}", entry.last_used.format("%Y-%m-%d %H:%M"), entry.label());
                }
            }
            prompt => {
                if let Err(err) = client.prompt(prompt).await {
                    eprintln!("error: {err} ({})", err.suggested_action());
                }
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}
