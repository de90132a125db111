//! Client for the Indusagi RPC agent
//!
//! Runs the agent as a child process speaking newline-delimited JSON, keeps
//! a cache of its reported state, and turns its output into a stream of
//! normalized events.
//!
//! # Architecture
//!
//! The client is built on three layers:
//!
//! 1. **Protocol Layer** (`indusagi-protocol`): wire types
//! 2. **Transport Layer** (`indusagi-transport`): process supervision and line framing
//! 3. **Agent Layer** (this crate): request correlation, routing, state and the client API
//!
//! Inside this crate, requests flow caller → [`correlator`] → transport, and
//! every line the agent prints flows through the single [`router`] task,
//! which either completes a pending request or updates the [`state`] cache
//! and emits an [`AgentEvent`].
//!
//! # Usage Example
//!
//! ```ignore
//! use indusagi_agent::{AgentClient, AgentConfig, AgentEvent, SessionHistoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AgentConfig::from_env()?;
//!     let history = Arc::new(SessionHistoryStore::new(config.history_limit));
//!     let (client, mut events) = AgentClient::new(config, history)?;
//!
//!     client.prompt("What is 2+2?").await?;
//!     while let Some(event) = events.recv().await {
//!         if let AgentEvent::MessageComplete { text } = event {
//!             println!("{text}");
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod events;
pub mod history;
pub mod router;
pub mod state;
pub mod testing;

pub use client::AgentClient;
pub use config::AgentConfig;
pub use correlator::{PendingRequest, RequestCorrelator, RequestKind};
pub use error::{AgentError, Result};
pub use events::{AgentEvent, ToolEvent};
pub use history::{SessionHistory, SessionHistoryEntry, SessionHistoryStore};
pub use router::{EventRouter, StreamAccumulator};
pub use state::{StateCache, StateWriter, state_channel};

// Re-export protocol and transport types callers commonly need
pub use indusagi_protocol::{
    AgentState, Command, ModelDescriptor, ModelRef, Reply, RequestId, ThinkingLevel,
    TranscriptEntry,
};
pub use indusagi_transport::ProcessState;
