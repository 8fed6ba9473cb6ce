//! Error types for the preset store.

use thiserror::Error;

use crate::types::ValueType;

/// Main error type for preset store operations.
#[derive(Error, Debug, Clone)]
pub enum PresetError {
    /// A document could not be parsed.
    #[error("Failed to parse document: {message}")]
    Parse { message: String },

    /// Filesystem read or write failed.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A field value does not convert to its declared type.
    #[error("Cannot convert '{value}' to {declared} for key '{field}' in preset '{preset}' of '{document}'")]
    Conversion {
        document: String,
        preset: String,
        field: String,
        declared: ValueType,
        value: String,
    },

    /// The change watcher could not be started or failed mid-flight.
    #[error("Watcher error: {message}")]
    Watch { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PresetError {
    /// Returns true if the store recovers from this error locally.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Parse errors are quarantined, watcher errors only delay refresh.
            PresetError::Parse { .. } => true,
            PresetError::Watch { .. } => true,
            _ => false,
        }
    }
}

/// Convenience Result type for preset store operations.
pub type Result<T> = std::result::Result<T, PresetError>;

impl From<std::io::Error> for PresetError {
    fn from(err: std::io::Error) -> Self {
        PresetError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PresetError {
    fn from(err: serde_json::Error) -> Self {
        PresetError::Serialization(err.to_string())
    }
}
