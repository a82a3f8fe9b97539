//! nelson-program: deployment lifecycles as plain data.
//!
//! A [`Program`] describes a sequence of instructions drawn from a closed
//! catalog ([`Op`]) without performing any of them. Building one has no
//! side effects; an interpreter walks it one instruction at a time, feeds
//! each instruction's [`Outcome`] to the continuation, and stops at the
//! first failure.
//!
//! # Components
//!
//! - **`op`**: the instruction catalog, one flat union across registry,
//!   discovery, secrets, logging, storage and scheduler families
//! - **`outcome`**: typed instruction results and their conversion
//! - **`program`**: the `Program<T>` type and its combinators
//! - **`ops`**: typed constructors, one per instruction
//!
//! ```text
//! Program<T>::step()
//!   ├── Done(T)                       nothing left to do
//!   ├── Instruction(Op, Suspended)    perform Op, then resume with its Outcome
//!   └── Failed(WorkflowError)         terminal failure
//! ```

pub mod error;
pub mod op;
pub mod ops;
pub mod outcome;
pub mod program;

pub use error::WorkflowError;
pub use op::{Family, Op};
pub use outcome::{ExecResult, FromOutcome, LaunchHandle, Outcome, RegistryLog, TagResult};
pub use program::{Program, Step, Suspended};
