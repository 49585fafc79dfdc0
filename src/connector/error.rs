use crate::auth::AuthError;
use crate::cos::CosError;
use crate::credentials::ConfigError;
use crate::job::JobError;
use crate::platform::{ApiError, ResourceKind};
use thiserror::Error;

/// Errors surfaced by connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("{kind} '{key}' not found")]
    NotFound { kind: ResourceKind, key: String },

    #[error("Cannot create model asset '{name}': {reason}")]
    Asset { name: String, reason: String },

    #[error("Cannot deploy '{name}': {reason}")]
    Deployment { name: String, reason: String },

    #[error("Transport error on {kind}: {reason}")]
    Transport { kind: ResourceKind, reason: String },

    #[error("{kind} request rejected ({status}): {message}")]
    Remote {
        kind: ResourceKind,
        status: u16,
        message: String,
    },

    #[error("Object storage error: {0}")]
    Storage(#[from] CosError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ApiError> for ConnectorError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::NotFound { kind, id } => ConnectorError::NotFound { kind, key: id },
            ApiError::Unauthorized { kind, message } => ConnectorError::Remote {
                kind,
                status: 403,
                message,
            },
            ApiError::Rejected {
                kind,
                status,
                message,
            } => ConnectorError::Remote {
                kind,
                status,
                message,
            },
            ApiError::Transport { kind, reason } => ConnectorError::Transport { kind, reason },
            ApiError::Auth(e) => ConnectorError::Auth(e),
            e @ ApiError::Decode { .. } => ConnectorError::Other(e.into()),
        }
    }
}

impl From<JobError> for ConnectorError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::Api(e) => e.into(),
            other => ConnectorError::Other(other.into()),
        }
    }
}

impl ConnectorError {
    /// Worth retrying later: the failure was in transport, not in the request
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Transport { .. } => true,
            ConnectorError::Storage(CosError::Api(e)) => e.is_transient(),
            ConnectorError::Storage(CosError::Storage(e)) => e.is_transient(),
            _ => false,
        }
    }

    /// Configuration or credentials must change before anything can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectorError::Config(_) | ConnectorError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectorError::NotFound { .. })
    }
}
