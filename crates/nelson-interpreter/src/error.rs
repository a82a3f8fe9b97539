//! Backend failures.

use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Why a backend could not carry out an instruction.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    State(#[from] nelson_state::StateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BackendError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
