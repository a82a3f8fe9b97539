//! Deploy and destroy requests, end to end.

use thiserror::Error;
use tracing::{error, info, warn};

use nelson_core::config::WorkflowConfig;
use nelson_core::{
    Datacenter, Deployment, DeploymentId, DeploymentStatus, Namespace, NamespaceName,
    NelsonConfig, Plan, UnitDef,
};
use nelson_program::WorkflowError;
use nelson_workflow::status::status;
use nelson_workflow::strategy::{self, DynWorkflow};

use crate::backend::Backends;
use crate::interpreter::Interpreter;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no workflow named {name:?} (known: {known})")]
    WorkflowNotFound { name: String, known: String },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Everything needed to deploy one unit.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Workflow name, matched ignoring case. `None` uses the runner's default.
    pub workflow: Option<&'a str>,
    pub id: DeploymentId,
    pub hash: &'a str,
    pub unit: &'a UnitDef,
    pub plan: &'a Plan,
    pub datacenter: &'a Datacenter,
    pub namespace: &'a NamespaceName,
}

/// Resolves workflows by name and runs them.
pub struct Runner {
    interpreter: Interpreter,
    default_workflow: String,
}

impl Runner {
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            default_workflow: WorkflowConfig::default().default,
        }
    }

    /// Deadlines and default workflow from `config`.
    pub fn from_config(backends: Backends, config: &NelsonConfig) -> Self {
        Self::new(Interpreter::from_config(backends, config))
            .with_default_workflow(config.workflow.default.as_str())
    }

    pub fn with_default_workflow(mut self, name: impl Into<String>) -> Self {
        self.default_workflow = name.into();
        self
    }

    /// Run the deploy described by `request`.
    ///
    /// The deployment record must already be stored. On failure a `Failed`
    /// status carrying the error message is recorded before returning.
    pub async fn deploy(&self, request: &DeployRequest<'_>) -> Result<(), RunError> {
        let strategy = lookup(request.workflow.unwrap_or(self.default_workflow.as_str()))?;
        info!(
            workflow = strategy.name(),
            id = request.id,
            stack = %request.unit.stack_name(request.hash),
            datacenter = %request.datacenter.name,
            namespace = %request.namespace,
            "deploying"
        );
        let program = strategy.deploy(
            request.id,
            request.hash,
            request.unit,
            request.plan,
            request.datacenter,
            request.namespace,
        );
        let result = self.interpreter.run(program).await;
        self.settle(request.id, result).await
    }

    /// Decommission `deployment` with the workflow that deployed it.
    pub async fn destroy(
        &self,
        deployment: &Deployment,
        dc: &Datacenter,
        namespace: &Namespace,
    ) -> Result<(), RunError> {
        let strategy = lookup(&deployment.workflow)?;
        info!(
            workflow = strategy.name(),
            id = deployment.id,
            stack = %deployment.stack_name(),
            datacenter = %dc.name,
            "destroying"
        );
        let result = self
            .interpreter
            .run(strategy.destroy(deployment, dc, namespace))
            .await;
        self.settle(deployment.id, result).await
    }

    async fn settle(&self, id: DeploymentId, result: Result<(), WorkflowError>) -> Result<(), RunError> {
        if let Err(err) = &result {
            error!(id, error = %err, "workflow failed");
            let record = status(id, DeploymentStatus::Failed, err.to_string());
            if let Err(record_err) = self.interpreter.run(record).await {
                warn!(id, error = %record_err, "could not record workflow failure");
            }
        }
        Ok(result?)
    }
}

fn lookup(name: &str) -> Result<&'static DynWorkflow, RunError> {
    strategy::from_name(name).ok_or_else(|| RunError::WorkflowNotFound {
        name: name.to_string(),
        known: strategy::names().join(", "),
    })
}
