//! Transport error types

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The executable could not be started
    #[error("Failed to spawn {path}: {source}")]
    Spawn {
        /// Executable that failed to start
        path: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// No process handle exists
    #[error("Agent process is not running")]
    NotRunning,

    /// The process exists but its stdin is gone
    #[error("Agent stdin is closed")]
    StdinClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Process setup error
    #[error("Process error: {0}")]
    Process(String),
}
