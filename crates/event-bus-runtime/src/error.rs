//! Error types for event bus operations.

use thiserror::Error;

/// Boxed underlying cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Comprehensive error type for all event bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("{operation} call failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Replay not found: {replay_name}")]
    ReplayNotFound { replay_name: String },

    #[error("Replay already exists: {replay_name}")]
    ReplayAlreadyExists { replay_name: String },

    #[error("Remote response for {operation} is missing {field}")]
    IncompleteResponse {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Input transform failed: {message}")]
    InputTransform { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl BusError {
    /// Wrap a transport-level failure, keeping the original error as source.
    pub fn transport<E>(operation: &'static str, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            operation,
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Check if error came from the network or the remote service
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },
}
