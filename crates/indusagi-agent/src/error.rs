//! Error types for the agent client
//!
//! Every failure a caller can observe from a request is one of these
//! variants. Malformed lines and replies to unknown ids are logged by the
//! router and never surface here.

use indusagi_protocol::{ProtocolError, RequestId};
use indusagi_transport::TransportError;
use std::time::Duration;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur in agent operations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The agent executable could not be started
    #[error("Failed to start agent {path}: {source}")]
    Spawn {
        /// Executable that failed to start
        path: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The request could not be written to the agent
    #[error("Failed to write request: {0}")]
    Write(#[source] TransportError),

    /// No reply arrived before the deadline
    #[error("Request {id} timed out after {timeout:?}")]
    Timeout {
        /// Request that timed out
        id: RequestId,
        /// Deadline that was applied
        timeout: Duration,
    },

    /// The agent process exited while the request was in flight
    #[error("Agent process terminated before request {id} completed")]
    Terminated {
        /// Request that was abandoned
        id: RequestId,
    },

    /// The agent replied with an error
    #[error("Agent rejected {}: {message}", .command.as_deref().unwrap_or("request"))]
    Rejected {
        /// Request that was rejected
        id: RequestId,
        /// Command echoed by the agent
        command: Option<String>,
        /// Error reported by the agent
        message: String,
    },

    /// Malformed request or reply payload
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// The client was shut down and no longer routes replies
    #[error("Agent client has been shut down")]
    Shutdown,
}

impl From<TransportError> for AgentError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Spawn { path, source } => Self::Spawn { path, source },
            other => Self::Transport(other),
        }
    }
}

impl AgentError {
    /// Whether resending the same request may succeed
    ///
    /// Timeouts and terminations are transient: the next call restarts the
    /// agent if needed. Write failures usually mean the process just died.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Terminated { .. } | Self::Write(_)
        )
    }

    /// User-facing action to take
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => {
                "Agent executable could not be started. Check that it is installed \
                and that INDUSAGI_PATH points to it."
            }
            Self::Write(_) | Self::Terminated { .. } => {
                "Agent process went away. It is restarted on the next request."
            }
            Self::Timeout { .. } => {
                "Agent did not answer in time. Retry, or raise the request timeout."
            }
            Self::Rejected { .. } => "Agent refused the request. Check the command arguments.",
            Self::Protocol(_) => "Malformed payload. Check the agent version.",
            Self::Config(_) => "Fix the configuration and create a new client.",
            Self::Transport(_) => "Transport error. Check the agent process logs.",
            Self::Shutdown => "Create a new client.",
        }
    }

    /// Request id the error belongs to, when it concerns a single request
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Timeout { id, .. } | Self::Terminated { id } | Self::Rejected { id, .. } => {
                Some(id)
            }
            _ => None,
        }
    }
}
