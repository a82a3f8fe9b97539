//! State store errors.

use nelson_core::{DeploymentId, DeploymentStatus};
use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// Why a state store operation failed.
///
/// The storage variants carry the underlying redb or serde_json message;
/// the last three are domain rejections the store enforces itself.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state database: {0}")]
    Open(String),

    #[error("state transaction failed: {0}")]
    Transaction(String),

    #[error("state table unavailable: {0}")]
    Table(String),

    #[error("state read failed: {0}")]
    Read(String),

    #[error("state write failed: {0}")]
    Write(String),

    #[error("cannot encode record: {0}")]
    Encode(String),

    #[error("corrupt record: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("deployment {deployment} cannot move from {from} back to {to}")]
    StatusRegression {
        deployment: DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("status {0} cannot be recorded")]
    UnrecordableStatus(DeploymentStatus),
}
