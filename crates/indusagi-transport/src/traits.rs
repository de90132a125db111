//! Transport trait and events
//!
//! The request correlator only ever needs to write a line and to know which
//! process generation it is talking to. Keeping that behind a trait lets the
//! agent crate run against a mock in tests.

use crate::error::Result;
use crate::lifecycle::ProcessState;
use async_trait::async_trait;

/// Something read from (or observed about) the agent process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete stdout line
    Line {
        /// Process generation that produced the line
        generation: u64,
        /// Line content without terminator
        line: String,
    },

    /// The process exited; emitted after its last line
    Exited {
        /// Generation of the process that exited
        generation: u64,
        /// Exit code, absent when killed by a signal
        code: Option<i32>,
    },
}

/// Write side of the agent connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one line followed by a newline
    ///
    /// Does not wait for the process to become ready.
    async fn write_line(&self, line: &str) -> Result<()>;

    /// Generation of the current process (0 before the first spawn)
    fn generation(&self) -> u64;

    /// Record that the agent announced readiness
    fn mark_ready(&self);

    /// Current lifecycle state
    fn state(&self) -> ProcessState;
}
