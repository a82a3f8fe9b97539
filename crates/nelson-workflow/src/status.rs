//! Status transitions that are also written to the deployment log.

use nelson_core::{DeploymentId, DeploymentStatus};
use nelson_program::ops::{logging, storage};
use nelson_program::Program;

/// Record `status` with `message`, then write the same message to the
/// deployment's log.
///
/// The durable entry goes first: a status the store refuses fails the
/// program before anything reaches the log, so the log never carries a
/// transition that was not recorded.
pub fn status(id: DeploymentId, status: DeploymentStatus, message: impl Into<String>) -> Program<()> {
    let message = message.into();
    storage::create_deployment_status(id, status, Some(message.clone()))
        .then(logging::log_to_file(id, message))
}
