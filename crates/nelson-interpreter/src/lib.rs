//! nelson-interpreter: executes workflow programs.
//!
//! A [`Program`](nelson_program::Program) is only a description. The
//! [`Interpreter`] walks it one instruction at a time, dispatching each to
//! the backend for its family and feeding the outcome back in. The
//! [`Runner`] ties that to the workflow registry and records failures.
//!
//! # Components
//!
//! - **`backend`**: async traits for each backend, bundled in [`Backends`]
//! - **`interpreter`**: the run loop, with per-instruction and whole-program deadlines
//! - **`memory`**: in-memory backends for tests and local runs
//! - **`file_log`**: per-deployment log files
//! - **`storage`**: [`Storage`] over the redb `StateStore`
//! - **`runner`**: resolve a workflow by name, run it, record failure

pub mod backend;
pub mod error;
pub mod file_log;
pub mod interpreter;
pub mod memory;
pub mod runner;
pub mod storage;

pub use backend::{
    Backends, DeploymentLog, DiscoveryStore, RegistryClient, SchedulerBackend, SecretsStore,
    Storage,
};
pub use error::{BackendError, BackendResult};
pub use file_log::FileDeploymentLog;
pub use interpreter::Interpreter;
pub use runner::{DeployRequest, RunError, Runner};
