use thiserror::Error;

/// Errors related to bearer token acquisition
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity endpoint refused the configured credentials
    #[error("Identity endpoint {endpoint} rejected credentials ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Network failure or server-side error; worth retrying
    #[error("Identity endpoint {endpoint} unavailable: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The retry budget was spent on transport failures
    #[error("Identity endpoint {endpoint} unreachable after {attempts} attempts: {reason}")]
    Unreachable {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid token response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl AuthError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport { .. })
    }
}
