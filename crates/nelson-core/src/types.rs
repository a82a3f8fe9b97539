//! Domain types shared across Nelson crates.
//!
//! These describe *what* is deployed and *where*. Records that the
//! durable storage collaborator owns (deployments, namespaces, status
//! entries, traffic shifts) are serializable so they can be persisted as
//! JSON values.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::image::RegistryUri;
use crate::naming::{FeatureVersion, ServiceName, StackName};
use crate::policy::PolicyConfig;

/// Storage-assigned identifier of a deployment.
pub type DeploymentId = u64;

/// Storage-assigned identifier of a namespace.
pub type NamespaceId = u64;

// ── Units and plans ───────────────────────────────────────────────

/// What kind of workload a unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Service,
    Job,
}

/// A named port exposed by a unit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub number: u16,
    pub protocol: String,
}

/// A deployable unit at a specific version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    pub name: String,
    pub description: Option<String>,
    pub version: semver::Version,
    pub kind: UnitKind,
    /// Source image reference the unit was built into.
    pub image: String,
    pub ports: Vec<Port>,
    /// Services this unit calls.
    pub dependencies: Vec<ServiceName>,
    /// Resource names whose credentials the unit may read.
    pub resources: BTreeSet<String>,
}

impl UnitDef {
    /// A unit is routable (and so takes part in discovery) iff it exposes ports.
    pub fn is_service(&self) -> bool {
        !self.ports.is_empty()
    }

    pub fn feature_version(&self) -> FeatureVersion {
        FeatureVersion::from(&self.version)
    }

    pub fn service_name(&self) -> ServiceName {
        ServiceName::new(&self.name, self.feature_version())
    }

    pub fn stack_name(&self, hash: &str) -> StackName {
        StackName::new(&self.name, &self.version, hash)
    }
}

/// An alert the unit's owners have opted out of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertOptOut(pub String);

/// Resource and runtime plan applied when launching a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    /// CPU limit in cores.
    pub cpu: f64,
    /// Memory limit in MiB.
    pub memory_mib: u64,
    pub instances: u32,
    /// Overrides the datacenter's default traffic shift.
    pub traffic_shift: Option<TrafficShiftSettings>,
    pub alert_opt_outs: Vec<AlertOptOut>,
}

// ── Datacenters and namespaces ────────────────────────────────────

/// An isolated target execution environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datacenter {
    pub name: String,
    pub domain: String,
    pub registry: RegistryUri,
    pub policy: PolicyConfig,
    pub traffic_shift: TrafficShiftSettings,
}

impl Datacenter {
    /// The traffic shift to use for `plan`: its own override, else ours.
    pub fn traffic_shift_for(&self, plan: &Plan) -> TrafficShiftSettings {
        plan.traffic_shift.unwrap_or(self.traffic_shift)
    }
}

/// A namespace reference as written in a manifest (`dev`, `qa/blue`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceName(pub String);

impl NamespaceName {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A namespace as stored: scoped to exactly one datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: NamespaceId,
    pub name: NamespaceName,
    pub datacenter: String,
}

impl Namespace {
    /// Composite storage key `{datacenter}/{namespace}`.
    pub fn table_key(&self) -> String {
        namespace_key(&self.datacenter, &self.name)
    }
}

pub fn namespace_key(datacenter: &str, name: &NamespaceName) -> String {
    format!("{datacenter}/{name}")
}

// ── Deployments ───────────────────────────────────────────────────

/// The slice of a unit definition a running deployment keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedUnit {
    pub name: String,
    pub version: semver::Version,
    pub ports: Vec<Port>,
    pub dependencies: Vec<ServiceName>,
}

impl From<&UnitDef> for DeployedUnit {
    fn from(unit: &UnitDef) -> Self {
        Self {
            name: unit.name.clone(),
            version: unit.version.clone(),
            ports: unit.ports.clone(),
            dependencies: unit.dependencies.clone(),
        }
    }
}

/// A materialized instance of a unit+plan in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub unit: DeployedUnit,
    pub plan: String,
    pub namespace: NamespaceId,
    pub hash: String,
    /// Name of the workflow that deployed it.
    pub workflow: String,
    /// Unix timestamp (seconds).
    pub deployed_at: u64,
}

impl Deployment {
    pub fn stack_name(&self) -> StackName {
        StackName::new(&self.unit.name, &self.unit.version, &self.hash)
    }

    pub fn service_name(&self) -> ServiceName {
        ServiceName::new(&self.unit.name, FeatureVersion::from(&self.unit.version))
    }
}

/// Lifecycle stage of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Warming,
    Ready,
    Deprecated,
    Failed,
    Garbage,
    Terminated,
    Unknown,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 9] = [
        Self::Pending,
        Self::Deploying,
        Self::Warming,
        Self::Ready,
        Self::Deprecated,
        Self::Failed,
        Self::Garbage,
        Self::Terminated,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Warming => "warming",
            Self::Ready => "ready",
            Self::Deprecated => "deprecated",
            Self::Failed => "failed",
            Self::Garbage => "garbage",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }

    /// Position in the lifecycle. A deployment never moves to a lower rank.
    ///
    /// `Unknown` has no rank: it describes a record that could not be read,
    /// never a stage a workflow may record.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Deploying => Some(1),
            Self::Warming => Some(2),
            Self::Ready => Some(3),
            Self::Deprecated => Some(4),
            Self::Failed => Some(5),
            Self::Garbage => Some(6),
            Self::Terminated => Some(7),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

/// One entry in a deployment's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub deployment: DeploymentId,
    pub status: DeploymentStatus,
    pub message: Option<String>,
    /// Unix timestamp (seconds).
    pub recorded_at: u64,
}

// ── Traffic shifting ──────────────────────────────────────────────

/// How traffic migrates from the previous deployment to the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficShiftPolicy {
    /// All traffic moves as soon as the shift starts.
    Atomic,
    /// Traffic moves proportionally to elapsed time over the duration.
    Linear,
}

impl TrafficShiftPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Linear => "linear",
        }
    }

    /// Percentage weights `(from, to)` after `elapsed` of a `duration` shift.
    pub fn weights(&self, elapsed: Duration, duration: Duration) -> (u32, u32) {
        let to = match self {
            Self::Atomic => 100,
            Self::Linear if duration.is_zero() || elapsed >= duration => 100,
            Self::Linear => (elapsed.as_millis() * 100 / duration.as_millis()) as u32,
        };
        (100 - to, to)
    }
}

impl fmt::Display for TrafficShiftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrafficShiftPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "linear" => Ok(Self::Linear),
            other => Err(CoreError::UnknownTrafficShiftPolicy(other.to_string())),
        }
    }
}

/// Policy plus duration, as configured on a datacenter or plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficShiftSettings {
    pub policy: TrafficShiftPolicy,
    pub duration_secs: u64,
}

impl TrafficShiftSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for TrafficShiftSettings {
    fn default() -> Self {
        Self {
            policy: TrafficShiftPolicy::Atomic,
            duration_secs: 0,
        }
    }
}

/// A stored traffic shift between two deployments of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficShift {
    pub namespace: NamespaceId,
    pub from: DeploymentId,
    pub to: DeploymentId,
    pub policy: TrafficShiftPolicy,
    /// Unix timestamp (seconds) at which the shift started.
    pub start: u64,
    pub duration_secs: u64,
}

impl TrafficShift {
    /// Composite storage key `{namespace}:{to}`; at most one shift per target.
    pub fn table_key(&self) -> String {
        traffic_shift_key(self.namespace, self.to)
    }

    /// Weights `(from, to)` at unix time `now`.
    pub fn weights_at(&self, now: u64) -> (u32, u32) {
        let elapsed = Duration::from_secs(now.saturating_sub(self.start));
        self.policy
            .weights(elapsed, Duration::from_secs(self.duration_secs))
    }
}

pub fn traffic_shift_key(namespace: NamespaceId, to: DeploymentId) -> String {
    format!("{namespace:020}:{to:020}")
}
