use crate::auth::AuthError;
use crate::platform::resource::ResourceKind;
use thiserror::Error;

/// Errors returned by the platform REST surface
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Not authorized to access {kind}: {message}")]
    Unauthorized { kind: ResourceKind, message: String },

    #[error("{kind} request rejected ({status}): {message}")]
    Rejected {
        kind: ResourceKind,
        status: u16,
        message: String,
    },

    /// Network failure, timeout, throttling or server-side error
    #[error("Transport error on {kind}: {reason}")]
    Transport { kind: ResourceKind, reason: String },

    #[error("Unexpected {kind} response: {reason}")]
    Decode { kind: ResourceKind, reason: String },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}
