use thiserror::Error;

/// Errors raised while validating credential configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field '{field}' for {mode} deployment")]
    MissingField { mode: &'static str, field: &'static str },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Incomplete object storage settings: '{0}' is required when any cos_* field is set")]
    IncompleteStorage(&'static str),
}
