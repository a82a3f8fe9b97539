//! Backend traits, one per instruction family.
//!
//! Each trait is the whole contract the interpreter needs from that
//! backend. Implementations must be `Send + Sync` so a single [`Backends`]
//! bundle can be shared across concurrently running programs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use nelson_core::{
    Datacenter, Deployment, DeploymentId, DeploymentStatus, Image, Namespace, NamespaceId,
    NamespaceName, Plan, RegistryUri, RoutingGraph, SecretPolicy, TrafficShiftPolicy, UnitDef,
};
use nelson_program::{ExecResult, LaunchHandle, TagResult};

use crate::error::BackendResult;

/// Image registry client.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// The image `unit` was built into.
    async fn extract(&self, unit: &UnitDef) -> BackendResult<Image>;

    async fn pull(&self, image: &Image) -> BackendResult<ExecResult>;

    /// Tag `image` for `registry`; the result carries the new reference.
    async fn tag(&self, image: &Image, registry: &RegistryUri) -> BackendResult<TagResult>;

    async fn push(&self, image: &Image) -> BackendResult<ExecResult>;
}

/// Service-discovery key/value store.
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> BackendResult<()>;
}

/// Secret-access policy store.
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Create or replace the policy named `policy.name`.
    async fn write_policy(&self, policy: &SecretPolicy) -> BackendResult<()>;

    async fn delete_policy(&self, name: &str) -> BackendResult<()>;
}

/// Per-deployment log.
#[async_trait]
pub trait DeploymentLog: Send + Sync {
    async fn append(&self, id: DeploymentId, line: &str) -> BackendResult<()>;
}

/// Durable state.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        message: Option<String>,
    ) -> BackendResult<()>;

    async fn get_deployment(&self, id: DeploymentId) -> BackendResult<Option<Deployment>>;

    async fn get_namespace(
        &self,
        datacenter: &str,
        namespace: &NamespaceName,
    ) -> BackendResult<Option<Namespace>>;

    async fn routing_graph(&self, namespace: NamespaceId) -> BackendResult<RoutingGraph>;

    /// Idempotent per (namespace, target).
    async fn create_traffic_shift(
        &self,
        namespace: NamespaceId,
        target: &Deployment,
        policy: TrafficShiftPolicy,
        duration: Duration,
    ) -> BackendResult<()>;
}

/// Cluster scheduler adapter.
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    async fn launch(
        &self,
        image: &Image,
        datacenter: &Datacenter,
        namespace: &NamespaceName,
        unit: &UnitDef,
        plan: &Plan,
        hash: &str,
    ) -> BackendResult<LaunchHandle>;

    async fn delete(&self, datacenter: &Datacenter, deployment: &Deployment) -> BackendResult<()>;
}

/// Every backend a program may address.
#[derive(Clone)]
pub struct Backends {
    pub registry: Arc<dyn RegistryClient>,
    pub discovery: Arc<dyn DiscoveryStore>,
    pub secrets: Arc<dyn SecretsStore>,
    pub log: Arc<dyn DeploymentLog>,
    pub storage: Arc<dyn Storage>,
    pub scheduler: Arc<dyn SchedulerBackend>,
}
