//! Workflow failure channel.

use thiserror::Error;

/// Why a program stopped without producing a value.
///
/// Every failure, whether raised by the program itself, by a backend, or
/// by an interpreter deadline, travels through this one type. A timeout is
/// an [`WorkflowError::Instruction`] whose message says so.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The program chose to fail.
    #[error("{0}")]
    Failed(String),

    /// An instruction could not be carried out.
    #[error("{op} failed: {message}")]
    Instruction { op: &'static str, message: String },

    /// The interpreter answered an instruction with the wrong kind of result.
    #[error("{op} produced an unexpected {outcome} outcome")]
    UnexpectedOutcome {
        op: &'static str,
        outcome: &'static str,
    },
}

impl WorkflowError {
    pub fn instruction(op: &'static str, message: impl Into<String>) -> Self {
        Self::Instruction {
            op,
            message: message.into(),
        }
    }
}
