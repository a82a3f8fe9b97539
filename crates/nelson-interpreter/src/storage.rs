//! [`Storage`] over the redb state store.
//!
//! redb calls block, so each one runs on tokio's blocking pool.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use nelson_core::{
    Deployment, DeploymentId, DeploymentStatus, Namespace, NamespaceId, NamespaceName,
    RoutingGraph, TrafficShiftPolicy,
};
use nelson_state::{StateResult, StateStore};

use crate::backend::Storage;
use crate::error::BackendResult;

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn blocking<T, F>(store: &StateStore, f: F) -> BackendResult<T>
where
    T: Send + 'static,
    F: FnOnce(StateStore) -> StateResult<T> + Send + 'static,
{
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || f(store)).await??)
}

#[async_trait]
impl Storage for StateStore {
    async fn create_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        message: Option<String>,
    ) -> BackendResult<()> {
        blocking(self, move |s| s.append_status(id, status, message, unix_now()).map(|_| ())).await
    }

    async fn get_deployment(&self, id: DeploymentId) -> BackendResult<Option<Deployment>> {
        blocking(self, move |s| s.get_deployment(id)).await
    }

    async fn get_namespace(
        &self,
        datacenter: &str,
        namespace: &NamespaceName,
    ) -> BackendResult<Option<Namespace>> {
        let datacenter = datacenter.to_string();
        let namespace = namespace.clone();
        blocking(self, move |s| s.get_namespace(&datacenter, &namespace)).await
    }

    async fn routing_graph(&self, namespace: NamespaceId) -> BackendResult<RoutingGraph> {
        blocking(self, move |s| s.routing_graph(namespace, unix_now())).await
    }

    async fn create_traffic_shift(
        &self,
        namespace: NamespaceId,
        target: &Deployment,
        policy: TrafficShiftPolicy,
        duration: Duration,
    ) -> BackendResult<()> {
        let target = target.clone();
        blocking(self, move |s| {
            s.create_traffic_shift(namespace, &target, policy, duration, unix_now())
                .map(|_| ())
        })
        .await
    }
}
