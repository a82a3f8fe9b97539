//! Typed constructors, one per catalog instruction.
//!
//! Each constructor fixes the result type of its instruction, so a
//! workflow composing `registry::pull(..)` gets an `ExecResult` back and
//! nothing else.

/// Image registry instructions.
pub mod registry {
    use nelson_core::{Image, RegistryUri, UnitDef};

    use crate::op::Op;
    use crate::outcome::{ExecResult, TagResult};
    use crate::program::Program;

    pub fn extract(unit: &UnitDef) -> Program<Image> {
        Program::instruction(Op::Extract { unit: unit.clone() })
    }

    pub fn pull(image: &Image) -> Program<ExecResult> {
        Program::instruction(Op::Pull {
            image: image.clone(),
        })
    }

    pub fn tag(image: &Image, registry: &RegistryUri) -> Program<TagResult> {
        Program::instruction(Op::Tag {
            image: image.clone(),
            registry: registry.clone(),
        })
    }

    pub fn push(image: &Image) -> Program<ExecResult> {
        Program::instruction(Op::Push {
            image: image.clone(),
        })
    }
}

/// Service-discovery key/value instructions.
pub mod discovery {
    use crate::op::Op;
    use crate::program::Program;

    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Program<()> {
        Program::instruction(Op::DiscoveryPut {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn delete(key: impl Into<String>) -> Program<()> {
        Program::instruction(Op::DiscoveryDelete { key: key.into() })
    }
}

/// Secret-policy instructions.
pub mod secrets {
    use std::collections::BTreeSet;

    use nelson_core::{NamespaceName, PolicyConfig, StackName};

    use crate::op::Op;
    use crate::program::Program;

    pub fn create_policy(
        config: &PolicyConfig,
        stack: &StackName,
        namespace: &NamespaceName,
        roles: &BTreeSet<String>,
    ) -> Program<()> {
        Program::instruction(Op::CreatePolicy {
            config: config.clone(),
            stack: stack.clone(),
            namespace: namespace.clone(),
            roles: roles.clone(),
        })
    }

    pub fn delete_policy(stack: &StackName, namespace: &NamespaceName) -> Program<()> {
        Program::instruction(Op::DeletePolicy {
            stack: stack.clone(),
            namespace: namespace.clone(),
        })
    }
}

/// Logging instructions.
pub mod logging {
    use nelson_core::DeploymentId;

    use crate::op::Op;
    use crate::program::Program;

    /// Append a line to the deployment's own log.
    pub fn log_to_file(id: DeploymentId, message: impl Into<String>) -> Program<()> {
        Program::instruction(Op::LogToFile {
            id,
            message: message.into(),
        })
    }

    pub fn debug(message: impl Into<String>) -> Program<()> {
        Program::instruction(Op::Debug {
            message: message.into(),
        })
    }

    pub fn info(message: impl Into<String>) -> Program<()> {
        Program::instruction(Op::Info {
            message: message.into(),
        })
    }
}

/// Durable storage instructions.
pub mod storage {
    use std::time::Duration;

    use nelson_core::{
        Deployment, DeploymentId, DeploymentStatus, Namespace, NamespaceId, NamespaceName,
        RoutingGraph, TrafficShiftPolicy,
    };

    use crate::op::Op;
    use crate::program::Program;

    pub fn create_deployment_status(
        id: DeploymentId,
        status: DeploymentStatus,
        message: Option<String>,
    ) -> Program<()> {
        Program::instruction(Op::CreateDeploymentStatus {
            id,
            status,
            message,
        })
    }

    pub fn get_deployment(id: DeploymentId) -> Program<Deployment> {
        Program::instruction(Op::GetDeployment { id })
    }

    pub fn get_namespace(datacenter: &str, namespace: &NamespaceName) -> Program<Option<Namespace>> {
        Program::instruction(Op::GetNamespace {
            datacenter: datacenter.to_string(),
            namespace: namespace.clone(),
        })
    }

    pub fn routing_graph(namespace: NamespaceId) -> Program<RoutingGraph> {
        Program::instruction(Op::RoutingGraph { namespace })
    }

    pub fn create_traffic_shift(
        namespace: NamespaceId,
        target: &Deployment,
        policy: TrafficShiftPolicy,
        duration: Duration,
    ) -> Program<()> {
        Program::instruction(Op::CreateTrafficShift {
            namespace,
            target: target.clone(),
            policy,
            duration,
        })
    }
}

/// Cluster scheduler instructions.
pub mod scheduler {
    use nelson_core::{Datacenter, Deployment, Image, NamespaceName, Plan, UnitDef};

    use crate::op::Op;
    use crate::outcome::LaunchHandle;
    use crate::program::Program;

    pub fn launch(
        image: &Image,
        datacenter: &Datacenter,
        namespace: &NamespaceName,
        unit: &UnitDef,
        plan: &Plan,
        hash: &str,
    ) -> Program<LaunchHandle> {
        Program::instruction(Op::Launch {
            image: image.clone(),
            datacenter: datacenter.clone(),
            namespace: namespace.clone(),
            unit: unit.clone(),
            plan: plan.clone(),
            hash: hash.to_string(),
        })
    }

    pub fn delete(datacenter: &Datacenter, deployment: &Deployment) -> Program<()> {
        Program::instruction(Op::SchedulerDelete {
            datacenter: datacenter.clone(),
            deployment: deployment.clone(),
        })
    }
}
