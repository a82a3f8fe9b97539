//! The instruction catalog.
//!
//! Every instruction any workflow may issue is a variant of [`Op`]. The
//! union is deliberately flat: sequencing is written once, in
//! [`crate::Program`], and does not care which family an instruction comes
//! from. The result type each instruction yields is fixed by its typed
//! constructor in [`crate::ops`].

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use nelson_core::{
    Datacenter, Deployment, DeploymentId, DeploymentStatus, Image, NamespaceId, NamespaceName,
    Plan, PolicyConfig, RegistryUri, StackName, TrafficShiftPolicy, UnitDef,
};

/// Which backend an instruction is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Registry,
    Discovery,
    Secrets,
    Logging,
    Storage,
    Scheduler,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Family::Registry => "registry",
            Family::Discovery => "discovery",
            Family::Secrets => "secrets",
            Family::Logging => "logging",
            Family::Storage => "storage",
            Family::Scheduler => "scheduler",
        };
        f.write_str(s)
    }
}

/// One atomic instruction. Constructing it performs nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ── Registry ───────────────────────────────────────────────────
    /// Resolve the image a unit was built into. Yields `Image`.
    Extract { unit: UnitDef },
    /// Pull an image locally. Yields `ExecResult`.
    Pull { image: Image },
    /// Tag an image for another registry. Yields `TagResult`.
    Tag { image: Image, registry: RegistryUri },
    /// Push an image. Yields `ExecResult`.
    Push { image: Image },

    // ── Discovery ──────────────────────────────────────────────────
    DiscoveryPut { key: String, value: String },
    DiscoveryDelete { key: String },

    // ── Secrets ────────────────────────────────────────────────────
    CreatePolicy {
        config: PolicyConfig,
        stack: StackName,
        namespace: NamespaceName,
        roles: BTreeSet<String>,
    },
    DeletePolicy {
        stack: StackName,
        namespace: NamespaceName,
    },

    // ── Logging ────────────────────────────────────────────────────
    LogToFile { id: DeploymentId, message: String },
    Debug { message: String },
    Info { message: String },

    // ── Storage ────────────────────────────────────────────────────
    CreateDeploymentStatus {
        id: DeploymentId,
        status: DeploymentStatus,
        message: Option<String>,
    },
    /// Yields `Deployment`; a missing record is an instruction failure.
    GetDeployment { id: DeploymentId },
    /// Yields `Option<Namespace>`.
    GetNamespace {
        datacenter: String,
        namespace: NamespaceName,
    },
    /// Yields `RoutingGraph`.
    RoutingGraph { namespace: NamespaceId },
    CreateTrafficShift {
        namespace: NamespaceId,
        target: Deployment,
        policy: TrafficShiftPolicy,
        duration: Duration,
    },

    // ── Scheduler ──────────────────────────────────────────────────
    /// Yields `LaunchHandle`.
    Launch {
        image: Image,
        datacenter: Datacenter,
        namespace: NamespaceName,
        unit: UnitDef,
        plan: Plan,
        hash: String,
    },
    SchedulerDelete {
        datacenter: Datacenter,
        deployment: Deployment,
    },
}

impl Op {
    pub fn family(&self) -> Family {
        match self {
            Op::Extract { .. } | Op::Pull { .. } | Op::Tag { .. } | Op::Push { .. } => {
                Family::Registry
            }
            Op::DiscoveryPut { .. } | Op::DiscoveryDelete { .. } => Family::Discovery,
            Op::CreatePolicy { .. } | Op::DeletePolicy { .. } => Family::Secrets,
            Op::LogToFile { .. } | Op::Debug { .. } | Op::Info { .. } => Family::Logging,
            Op::CreateDeploymentStatus { .. }
            | Op::GetDeployment { .. }
            | Op::GetNamespace { .. }
            | Op::RoutingGraph { .. }
            | Op::CreateTrafficShift { .. } => Family::Storage,
            Op::Launch { .. } | Op::SchedulerDelete { .. } => Family::Scheduler,
        }
    }

    /// Stable `family.operation` name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Extract { .. } => "registry.extract",
            Op::Pull { .. } => "registry.pull",
            Op::Tag { .. } => "registry.tag",
            Op::Push { .. } => "registry.push",
            Op::DiscoveryPut { .. } => "discovery.put",
            Op::DiscoveryDelete { .. } => "discovery.delete",
            Op::CreatePolicy { .. } => "secrets.create_policy",
            Op::DeletePolicy { .. } => "secrets.delete_policy",
            Op::LogToFile { .. } => "logging.log_to_file",
            Op::Debug { .. } => "logging.debug",
            Op::Info { .. } => "logging.info",
            Op::CreateDeploymentStatus { .. } => "storage.create_deployment_status",
            Op::GetDeployment { .. } => "storage.get_deployment",
            Op::GetNamespace { .. } => "storage.get_namespace",
            Op::RoutingGraph { .. } => "storage.routing_graph",
            Op::CreateTrafficShift { .. } => "storage.create_traffic_shift",
            Op::Launch { .. } => "scheduler.launch",
            Op::SchedulerDelete { .. } => "scheduler.delete",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_by_family() {
        let ops = [
            Op::Debug {
                message: "x".to_string(),
            },
            Op::DiscoveryDelete {
                key: "k".to_string(),
            },
            Op::GetDeployment { id: 7 },
            Op::Pull {
                image: Image::parse("units/search:1.0.0").unwrap(),
            },
        ];
        for op in &ops {
            assert!(op.name().starts_with(&op.family().to_string()), "{op}");
        }
    }
}
