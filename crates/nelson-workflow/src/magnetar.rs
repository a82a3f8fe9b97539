//! Magnetar: the full workflow.
//!
//! Deploy promotes the image, launches it, grants secret access and, for
//! services, publishes discovery and starts a traffic shift. Destroy
//! undoes each of those in reverse.

use nelson_core::{
    Datacenter, Deployment, DeploymentId, DeploymentStatus, Image, Namespace, NamespaceName,
    Plan, UnitDef,
};
use nelson_program::ops::{logging, scheduler};
use nelson_program::Program;

use crate::alerts::{delete_alert_opt_outs, write_alert_opt_outs};
use crate::discovery::{delete_discovery, write_discovery};
use crate::policy::{delete_policy, write_policy};
use crate::promotion::promote_image;
use crate::status::status;
use crate::strategy::Workflow;
use crate::traffic::create_traffic_shift;

#[derive(Debug, Clone, Copy, Default)]
pub struct Magnetar;

impl Workflow for Magnetar {
    type Output = ();

    fn name(&self) -> &'static str {
        "magnetar"
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
        let shift = dc.traffic_shift_for(plan);

        let launch = {
            let (hash, unit, plan, dc, namespace) =
                (hash.to_string(), unit.clone(), plan.clone(), dc.clone(), namespace.clone());
            move |image: Image| {
                status(
                    id,
                    DeploymentStatus::Deploying,
                    format!("instructing {}'s scheduler to handle service container", dc.name),
                )
                .then(scheduler::launch(&image, &dc, &namespace, &unit, &plan, &hash))
            }
        };

        let routing = Program::when(
            unit.is_service(),
            write_discovery(id, &stack, namespace, dc).then(create_traffic_shift(
                id,
                namespace,
                dc,
                shift.policy,
                shift.duration(),
            )),
        );

        status(id, DeploymentStatus::Pending, "magnetar workflow about to start")
            .then(promote_image(id, unit, &dc.registry))
            .and_then(launch)
            .and_then(|handle| logging::debug(format!("scheduler responded with {handle}")))
            .then(write_policy(&dc.policy, &stack, namespace, &unit.resources))
            .then(routing)
            .then(write_alert_opt_outs(&stack, namespace, dc, &plan.alert_opt_outs))
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
            .then(delete_alert_opt_outs(&stack, &namespace.name, dc))
            .then(delete_policy(&stack, &namespace.name))
            .then(status(
                deployment.id,
                DeploymentStatus::Terminated,
                format!("decommissioned {stack} in {}", dc.name),
            ))
    }
}
