use thiserror::Error;

/// Errors that can occur when interacting with the object-storage bucket
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object with key {0} not found")]
    ObjectNotFound(String),

    #[error("Access denied for object {0}: {1}")]
    AccessDenied(String, String),

    #[error("Failed to read object {0}: {1}")]
    ReadError(String, String),

    #[error("Failed to write object {0}: {1}")]
    WriteError(String, String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Other storage error: {0}")]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::NetworkError(_))
    }
}
