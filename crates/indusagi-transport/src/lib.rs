//! Subprocess transport for the Indusagi RPC agent
//!
//! Owns the agent process and its three standard streams. Bytes read from
//! stdout are framed into complete lines and handed to a single consumer as
//! [`TransportEvent`]s; stderr is logged and never parsed.
//!
//! # Architecture
//!
//! - **Framer**: [`framer::LineFramer`] turns an arbitrary chunked byte stream into lines
//! - **Process configuration**: [`ProcessConfig`] describes how to launch the agent
//! - **Supervisor**: [`ProcessSupervisor`] spawns, tracks and stops the process
//! - **Transport trait**: the write-side seam used by the request correlator
//!
//! # Usage
//!
//! ```ignore
//! use indusagi_transport::{ProcessConfig, ProcessSupervisor, Transport};
//!
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
//! let supervisor = ProcessSupervisor::new(ProcessConfig::new("indusagi"), events_tx);
//! supervisor.ensure_running().await?;
//! supervisor.write_line(r#"{"type":"get_state","id":"req-1"}"#).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod framer;
pub mod lifecycle;
pub mod subprocess;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use framer::LineFramer;
pub use lifecycle::ProcessState;
pub use subprocess::{ProcessConfig, ProcessSupervisor};
pub use traits::{Transport, TransportEvent};
