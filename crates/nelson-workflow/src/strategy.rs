//! Workflow strategies and the name registry.

use nelson_core::{Datacenter, Deployment, DeploymentId, Namespace, NamespaceName, Plan, UnitDef};
use nelson_program::Program;

use crate::canopus::Canopus;
use crate::magnetar::Magnetar;

/// A named deploy/destroy procedure.
///
/// Both methods only *build* a program; running it is the interpreter's
/// job, so calling them has no side effects.
pub trait Workflow: Send + Sync {
    type Output: Send + 'static;

    /// Registry name, as stored on each deployment.
    fn name(&self) -> &'static str;

    fn deploy(
        &self,
        id: DeploymentId,
        hash: &str,
        unit: &UnitDef,
        plan: &Plan,
        dc: &Datacenter,
        namespace: &NamespaceName,
    ) -> Program<Self::Output>;

    fn destroy(&self, deployment: &Deployment, dc: &Datacenter, namespace: &Namespace) -> Program<Self::Output>;
}

/// A workflow as held by the registry.
pub type DynWorkflow = dyn Workflow<Output = ()>;

static WORKFLOWS: [&DynWorkflow; 2] = [&Magnetar, &Canopus];

/// Every registered workflow.
pub fn all() -> &'static [&'static DynWorkflow] {
    &WORKFLOWS
}

/// Names of every registered workflow.
pub fn names() -> Vec<&'static str> {
    WORKFLOWS.iter().map(|w| w.name()).collect()
}

/// Look a workflow up by name, ignoring case.
pub fn from_name(name: &str) -> Option<&'static DynWorkflow> {
    WORKFLOWS
        .iter()
        .copied()
        .find(|w| w.name().eq_ignore_ascii_case(name))
}
