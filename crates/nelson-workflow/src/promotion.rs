//! Image promotion: copy a unit's image into the datacenter registry.
//!
//! `extract → pull → tag → push`. A registry step only succeeds with exit
//! code zero *and* no error markers in its output; otherwise the program
//! fails with every marker joined into one message.

use nelson_core::{DeploymentId, DeploymentStatus, Image, RegistryUri, UnitDef};
use nelson_program::ops::{logging, registry};
use nelson_program::{ExecResult, Program};

use crate::status::status;

/// Promote `unit`'s image into `destination`, yielding the pushed image.
pub fn promote_image(id: DeploymentId, unit: &UnitDef, destination: &RegistryUri) -> Program<Image> {
    let destination = destination.clone();
    registry::extract(unit).and_then(move |image| {
        let message = format!("replicating {image} to remote registry {destination}");
        status(id, DeploymentStatus::Deploying, message)
            .then(registry::pull(&image))
            .and_then(move |pulled| {
                check_registry_output(id, "pull", &image, pulled)
                    .then(registry::tag(&image, &destination))
            })
            .and_then(move |tagged| {
                if tagged.exit_code != 0 {
                    return Program::fail(format!(
                        "registry tag of {} failed with exit code {}",
                        tagged.image, tagged.exit_code
                    ));
                }
                registry::push(&tagged.image).and_then(move |pushed| {
                    check_registry_output(id, "push", &tagged.image, pushed)
                        .map(move |_| tagged.image)
                })
            })
    })
}

/// Append every output line to the deployment log, then fail unless the
/// step cleanly succeeded.
fn check_registry_output(
    id: DeploymentId,
    action: &'static str,
    image: &Image,
    result: ExecResult,
) -> Program<()> {
    let verdict = if result.succeeded() {
        Program::pure(())
    } else {
        Program::fail(format!(
            "registry {action} of {image} failed with exit code {}: {}",
            result.exit_code,
            result.errors().join(",")
        ))
    };
    let lines: Vec<String> = result.log.iter().map(ToString::to_string).collect();
    Program::for_each(lines, |line| logging::log_to_file(id, line)).then(verdict)
}
