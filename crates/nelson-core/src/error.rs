//! Error types for parsing core domain values.

use thiserror::Error;

/// Result type alias for core parsing operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised when a textual domain value cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    #[error("image {0} is pinned by digest only and cannot be retagged")]
    UntaggedImage(String),

    #[error("invalid stack name: {0}")]
    InvalidStackName(String),

    #[error("invalid service name: {0}")]
    InvalidServiceName(String),

    #[error("unknown traffic shift policy: {0}")]
    UnknownTrafficShiftPolicy(String),

    #[error("unknown deployment status: {0}")]
    UnknownStatus(String),
}
