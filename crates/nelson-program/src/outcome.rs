//! Instruction results.
//!
//! An interpreter answers every instruction with an [`Outcome`]. The
//! continuation built by a typed constructor converts it back into the
//! instruction's declared result type through [`FromOutcome`]; an outcome
//! of the wrong shape becomes [`crate::WorkflowError::UnexpectedOutcome`].

use std::fmt;

use serde::{Deserialize, Serialize};

use nelson_core::{Deployment, Image, Namespace, RoutingGraph};

/// One line of registry client output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryLog {
    Status {
        id: Option<String>,
        status: String,
        progress: Option<String>,
    },
    Error {
        message: String,
    },
}

impl RegistryLog {
    pub fn status(status: &str) -> Self {
        Self::Status {
            id: None,
            status: status.to_string(),
            progress: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// The error marker carried by this line, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            Self::Status { .. } => None,
        }
    }
}

impl fmt::Display for RegistryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status {
                id,
                status,
                progress,
            } => {
                if let Some(id) = id {
                    write!(f, "{id}: ")?;
                }
                f.write_str(status)?;
                if let Some(progress) = progress {
                    write!(f, " {progress}")?;
                }
                Ok(())
            }
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Exit code and output of a pull or push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i32,
    pub log: Vec<RegistryLog>,
}

impl ExecResult {
    pub fn new(exit_code: i32, log: Vec<RegistryLog>) -> Self {
        Self { exit_code, log }
    }

    /// Every error marker in the output, in order.
    pub fn errors(&self) -> Vec<&str> {
        self.log.iter().filter_map(RegistryLog::error_message).collect()
    }

    /// Exit code zero and no error markers.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.errors().is_empty()
    }
}

/// Exit code and resulting reference of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResult {
    pub exit_code: i32,
    pub image: Image,
}

/// Opaque handle returned by the scheduler for a launched deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchHandle(pub String);

impl fmt::Display for LaunchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The result of interpreting one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unit,
    Image(Image),
    Exec(ExecResult),
    Tagged(TagResult),
    Deployment(Box<Deployment>),
    Namespace(Option<Namespace>),
    RoutingGraph(RoutingGraph),
    Launched(LaunchHandle),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Unit => "unit",
            Outcome::Image(_) => "image",
            Outcome::Exec(_) => "exec",
            Outcome::Tagged(_) => "tagged",
            Outcome::Deployment(_) => "deployment",
            Outcome::Namespace(_) => "namespace",
            Outcome::RoutingGraph(_) => "routing_graph",
            Outcome::Launched(_) => "launched",
        }
    }
}

/// Recover an instruction's declared result from its outcome.
///
/// Returns the outcome unchanged when it has the wrong shape.
pub trait FromOutcome: Sized {
    fn from_outcome(outcome: Outcome) -> Result<Self, Outcome>;
}

impl FromOutcome for () {
    fn from_outcome(outcome: Outcome) -> Result<Self, Outcome> {
        match outcome {
            Outcome::Unit => Ok(()),
            other => Err(other),
        }
    }
}

impl FromOutcome for Deployment {
    fn from_outcome(outcome: Outcome) -> Result<Self, Outcome> {
        match outcome {
            Outcome::Deployment(d) => Ok(*d),
            other => Err(other),
        }
    }
}

/// Implement `FromOutcome` for a type carried directly by an `Outcome` variant.
macro_rules! from_outcome {
    ($ty:ty => $variant:ident) => {
        impl FromOutcome for $ty {
            fn from_outcome(outcome: Outcome) -> Result<Self, Outcome> {
                match outcome {
                    Outcome::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}

from_outcome!(Image => Image);
from_outcome!(ExecResult => Exec);
from_outcome!(TagResult => Tagged);
from_outcome!(Option<Namespace> => Namespace);
from_outcome!(RoutingGraph => RoutingGraph);
from_outcome!(LaunchHandle => Launched);
