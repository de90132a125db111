//! Wire types for the Indusagi RPC protocol
//!
//! The agent process speaks newline-delimited JSON in both directions. This
//! crate holds the pure data side of that contract: outbound commands and
//! request identifiers, the inbound message sum type, and the descriptors the
//! agent reports back (state, models, session stats, transcript entries).
//!
//! # Type Organization
//!
//! - **Requests**: [`request`] - request identifiers and line encoding
//! - **Commands**: [`command`] - the typed command set the client issues
//! - **Inbound**: [`inbound`] - events and direct replies read from the agent
//! - **State**: [`state`] - the agent state snapshot and its merge rules
//! - **Descriptors**: [`model`], [`session`], [`transcript`]
//! - **Errors**: [`error`]
//!
//! # Design Principles
//!
//! - **Zero I/O**: All types are pure data structures
//! - **Forward compatible**: unknown fields are kept in opaque maps

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```
//! use indusagi_protocol::{InboundMessage, RequestId, encode_request};
//!
//! let id = RequestId::from_sequence(1);
//! let line = encode_request("get_state", &id, serde_json::Map::new()).unwrap();
//! assert!(line.contains("\"id\":\"req-1\""));
//!
//! let msg = InboundMessage::parse(r#"{"type":"agent_start"}"#).unwrap();
//! assert_eq!(msg, InboundMessage::AgentStart);
//! ```

pub mod command;
pub mod error;
pub mod inbound;
pub mod model;
pub mod request;
pub mod session;
pub mod state;
pub mod transcript;

// Re-export commonly used types at crate level
pub use command::Command;
pub use error::{ProtocolError, Result};
pub use inbound::{AssistantMessageEvent, InboundMessage, Reply, ToolExecution, ToolPhase};
pub use model::{ModelDescriptor, ModelRef, ThinkingLevel};
pub use request::{RequestId, encode_request, params_to_map};
pub use session::{BashResult, CompactionResult, CycleModelResult, ForkResult, SessionStats, TokenStats};
pub use state::AgentState;
pub use transcript::{ForkMessage, TranscriptEntry};
