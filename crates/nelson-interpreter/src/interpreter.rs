//! The program run loop.
//!
//! The loop is explicit: take the next instruction, run it against its
//! backend under a deadline, hand the outcome to the continuation, repeat.
//! Programs of any length run in constant stack.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use nelson_core::policy::policy_name;
use nelson_core::NelsonConfig;
use nelson_program::{Op, Outcome, Program, Step, WorkflowError};

use crate::backend::Backends;
use crate::error::{BackendError, BackendResult};

/// Executes programs against a set of backends.
#[derive(Clone)]
pub struct Interpreter {
    backends: Backends,
    instruction_timeout: Option<Duration>,
    program_timeout: Option<Duration>,
}

impl Interpreter {
    /// An interpreter with no deadlines.
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            instruction_timeout: None,
            program_timeout: None,
        }
    }

    /// An interpreter with the deadlines from `config`.
    pub fn from_config(backends: Backends, config: &NelsonConfig) -> Self {
        Self::new(backends)
            .with_instruction_timeout(config.instruction_timeout())
            .with_program_timeout(config.program_timeout())
    }

    pub fn with_instruction_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.instruction_timeout = timeout;
        self
    }

    pub fn with_program_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.program_timeout = timeout;
        self
    }

    /// Run `program` to completion.
    ///
    /// The first failing instruction, elapsed deadline or explicit failure
    /// ends the run; nothing sequenced after it executes.
    pub async fn run<T: 'static>(&self, program: Program<T>) -> Result<T, WorkflowError> {
        let program_deadline = self.program_timeout.map(|t| Instant::now() + t);
        let mut program = program;
        let mut steps = 0usize;
        loop {
            match program.step() {
                Step::Done(value) => {
                    debug!(steps, "program finished");
                    return Ok(value);
                }
                Step::Failed(err) => {
                    warn!(steps, error = %err, "program failed");
                    return Err(err);
                }
                Step::Instruction(op, rest) => {
                    steps += 1;
                    let outcome = match self.perform(&op, program_deadline).await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(steps, op = op.name(), error = %err, "instruction failed");
                            return Err(err);
                        }
                    };
                    program = rest.resume(outcome);
                }
            }
        }
    }

    async fn perform(&self, op: &Op, program_deadline: Option<Instant>) -> Result<Outcome, WorkflowError> {
        let name = op.name();
        let now = Instant::now();
        if program_deadline.is_some_and(|d| d <= now) {
            return Err(WorkflowError::instruction(name, "timed out: program deadline elapsed"));
        }
        let deadline = match (self.instruction_timeout.map(|t| now + t), program_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        debug!(op = name, family = %op.family(), "executing instruction");
        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.execute(op))
                .await
                .map_err(|_| {
                    WorkflowError::instruction(
                        name,
                        format!("timed out after {:?}", deadline.duration_since(now)),
                    )
                })?,
            None => self.execute(op).await,
        };
        result.map_err(|e| WorkflowError::instruction(name, e.to_string()))
    }

    async fn execute(&self, op: &Op) -> BackendResult<Outcome> {
        let b = &self.backends;
        let outcome = match op {
            Op::Extract { unit } => Outcome::Image(b.registry.extract(unit).await?),
            Op::Pull { image } => Outcome::Exec(b.registry.pull(image).await?),
            Op::Tag { image, registry } => Outcome::Tagged(b.registry.tag(image, registry).await?),
            Op::Push { image } => Outcome::Exec(b.registry.push(image).await?),

            Op::DiscoveryPut { key, value } => {
                b.discovery.put(key, value).await?;
                Outcome::Unit
            }
            Op::DiscoveryDelete { key } => {
                b.discovery.delete(key).await?;
                Outcome::Unit
            }

            Op::CreatePolicy {
                config,
                stack,
                namespace,
                roles,
            } => {
                b.secrets
                    .write_policy(&config.render(stack, namespace, roles))
                    .await?;
                Outcome::Unit
            }
            Op::DeletePolicy { stack, namespace } => {
                b.secrets.delete_policy(&policy_name(stack, namespace)).await?;
                Outcome::Unit
            }

            Op::LogToFile { id, message } => {
                b.log.append(*id, message).await?;
                Outcome::Unit
            }
            Op::Debug { message } => {
                debug!(target: "nelson::workflow", "{message}");
                Outcome::Unit
            }
            Op::Info { message } => {
                info!(target: "nelson::workflow", "{message}");
                Outcome::Unit
            }

            Op::CreateDeploymentStatus {
                id,
                status,
                message,
            } => {
                b.storage
                    .create_deployment_status(*id, *status, message.clone())
                    .await?;
                Outcome::Unit
            }
            Op::GetDeployment { id } => match b.storage.get_deployment(*id).await? {
                Some(deployment) => Outcome::Deployment(Box::new(deployment)),
                None => return Err(BackendError::NotFound(format!("deployment {id}"))),
            },
            Op::GetNamespace {
                datacenter,
                namespace,
            } => Outcome::Namespace(b.storage.get_namespace(datacenter, namespace).await?),
            Op::RoutingGraph { namespace } => {
                Outcome::RoutingGraph(b.storage.routing_graph(*namespace).await?)
            }
            Op::CreateTrafficShift {
                namespace,
                target,
                policy,
                duration,
            } => {
                b.storage
                    .create_traffic_shift(*namespace, target, *policy, *duration)
                    .await?;
                Outcome::Unit
            }

            Op::Launch {
                image,
                datacenter,
                namespace,
                unit,
                plan,
                hash,
            } => Outcome::Launched(
                b.scheduler
                    .launch(image, datacenter, namespace, unit, plan, hash)
                    .await?,
            ),
            Op::SchedulerDelete {
                datacenter,
                deployment,
            } => {
                b.scheduler.delete(datacenter, deployment).await?;
                Outcome::Unit
            }
        };
        Ok(outcome)
    }
}
