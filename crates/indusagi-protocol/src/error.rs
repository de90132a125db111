//! Error types for protocol operations
//!
//! Covers decoding of inbound lines and validation of outbound payloads.

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during protocol operations
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message is not shaped like a protocol message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Thinking level name not recognised
    #[error("Unknown thinking level: {0}")]
    UnknownThinkingLevel(String),
}
