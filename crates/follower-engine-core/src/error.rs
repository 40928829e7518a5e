// Error types shared by the follower runtime and the append coalescer

/// Result type for follower runtime operations
pub type FollowerResult<T> = Result<T, FollowerError>;

/// Error types for follower runtime operations
#[derive(Debug, thiserror::Error, Clone)]
pub enum FollowerError {
    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    #[error("Event version {incoming} does not match state version {current} for key {key}")]
    VersionConflict {
        key: String,
        incoming: u64,
        current: u64,
    },

    #[error("Activation failed: {message}")]
    ActivationError { message: String },

    #[error("Channel error: {message}")]
    ChannelError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl From<serde_json::Error> for FollowerError {
    fn from(error: serde_json::Error) -> Self {
        FollowerError::SerializationError {
            message: error.to_string(),
        }
    }
}

impl From<bincode::Error> for FollowerError {
    fn from(error: bincode::Error) -> Self {
        FollowerError::SerializationError {
            message: error.to_string(),
        }
    }
}
