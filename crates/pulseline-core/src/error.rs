// Error types for the realtime client

use thiserror::Error;

/// Result type alias for realtime client operations
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur in the realtime subsystem
///
/// Nothing here is allowed to escape a public entry point as a panic: the
/// connection manager funnels transport errors into its retry schedule, the
/// dispatcher drops malformed frames, and the store absorbs api/storage
/// failures after logging them.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Stream or fetch transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// REST endpoint returned a failure
    #[error("API error: {0}")]
    Api(String),

    /// Local persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stream frame did not match the expected payload shape for its kind
    #[error("Malformed '{kind}' frame: {message}")]
    MalformedFrame { kind: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RealtimeError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        RealtimeError::Transport(msg.into())
    }

    /// Create an API error
    pub fn api(msg: impl Into<String>) -> Self {
        RealtimeError::Api(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        RealtimeError::Storage(msg.into())
    }

    /// Create a malformed-frame error
    pub fn malformed(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        RealtimeError::MalformedFrame {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RealtimeError::Configuration(msg.into())
    }
}
