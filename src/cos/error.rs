use crate::platform::ApiError;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the object-storage connector
#[derive(Error, Debug)]
pub enum CosError {
    #[error("Object {key} not found in bucket {bucket}")]
    NotFound { bucket: String, key: String },

    #[error("Object {key} is not valid UTF-8 text")]
    InvalidText { key: String },

    #[error("Failed to read local file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object storage is not configured: {0}")]
    Config(String),

    #[error("Connection asset error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
