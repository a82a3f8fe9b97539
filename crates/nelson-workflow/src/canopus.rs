//! Canopus: deploy without secret policies or traffic shifting.

use nelson_core::{
    Datacenter, Deployment, DeploymentId, DeploymentStatus, Image, Namespace, NamespaceName,
    Plan, UnitDef,
};
use nelson_program::ops::{logging, scheduler};
use nelson_program::Program;

use crate::discovery::{delete_discovery, write_discovery};
use crate::promotion::promote_image;
use crate::status::status;
use crate::strategy::Workflow;

#[derive(Debug, Clone, Copy, Default)]
pub struct Canopus;

impl Workflow for Canopus {
    type Output = ();

    fn name(&self) -> &'static str {
        "canopus"
    }

    fn deploy(
        &self,
        id: DeploymentId,
        hash: &str,
        unit: &UnitDef,
        plan: &Plan,
        dc: &Datacenter,
        namespace: &NamespaceName,
    ) -> Program<()> {
        let stack = unit.stack_name(hash);
        let (launch_hash, launch_unit, launch_plan, launch_dc, launch_ns) =
            (hash.to_string(), unit.clone(), plan.clone(), dc.clone(), namespace.clone());

        status(id, DeploymentStatus::Pending, "canopus workflow about to start")
            .then(promote_image(id, unit, &dc.registry))
            .and_then(move |image: Image| {
                status(
                    id,
                    DeploymentStatus::Deploying,
                    format!("instructing {}'s scheduler to handle service container", launch_dc.name),
                )
                .then(scheduler::launch(
                    &image,
                    &launch_dc,
                    &launch_ns,
                    &launch_unit,
                    &launch_plan,
                    &launch_hash,
                ))
            })
            .and_then(|handle| logging::debug(format!("scheduler responded with {handle}")))
            .then(Program::when(
                unit.is_service(),
                write_discovery(id, &stack, namespace, dc),
            ))
            .then(status(
                id,
                DeploymentStatus::Warming,
                format!("{stack} deployed to {}; waiting for it to become ready", dc.name),
            ))
    }

    fn destroy(&self, deployment: &Deployment, dc: &Datacenter, namespace: &Namespace) -> Program<()> {
        let stack = deployment.stack_name();
        logging::info(format!("instructing {}'s scheduler to delete {stack}", dc.name))
            .then(scheduler::delete(dc, deployment))
            .then(delete_discovery(&stack, &namespace.name, dc))
            .then(status(
                deployment.id,
                DeploymentStatus::Terminated,
                format!("decommissioned {stack} in {}", dc.name),
            ))
    }
}
