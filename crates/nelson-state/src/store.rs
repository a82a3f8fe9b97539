//! StateStore: redb-backed state persistence for Nelson.
//!
//! Provides typed operations over deployments, namespaces, the status
//! history and traffic shifts. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use tracing::debug;

use nelson_core::{
    namespace_key, traffic_shift_key, Deployment, DeploymentId, DeploymentStatus, Namespace,
    NamespaceId, NamespaceName, RoutingGraph, StatusRecord, TrafficShift, TrafficShiftPolicy,
};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.open_table(NAMESPACES).map_err(map_err!(Table))?;
        txn.open_table(STATUSES).map_err(map_err!(Table))?;
        txn.open_table(TRAFFIC_SHIFTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Deployments ────────────────────────────────────────────────

    /// Insert or update a deployment.
    pub fn put_deployment(&self, deployment: &Deployment) -> StateResult<()> {
        let key = deployment_key(deployment.id);
        let value = serde_json::to_vec(deployment).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = deployment.id, stack = %deployment.stack_name(), "deployment stored");
        Ok(())
    }

    pub fn get_deployment(&self, id: DeploymentId) -> StateResult<Option<Deployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        read_one(&table, &deployment_key(id))
    }

    /// All deployments, in id order.
    pub fn list_deployments(&self) -> StateResult<Vec<Deployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        read_prefix(&table, "")
    }

    /// Deployments in one namespace, in id order.
    pub fn list_deployments_in(&self, namespace: NamespaceId) -> StateResult<Vec<Deployment>> {
        let mut deployments = self.list_deployments()?;
        deployments.retain(|d| d.namespace == namespace);
        Ok(deployments)
    }

    /// The id the next deployment should take.
    pub fn next_deployment_id(&self) -> StateResult<DeploymentId> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match table.last().map_err(map_err!(Read))? {
            Some((_, value)) => {
                let last: Deployment =
                    serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                Ok(last.id + 1)
            }
            None => Ok(1),
        }
    }

    // ── Namespaces ─────────────────────────────────────────────────

    /// Return the namespace `name` in `datacenter`, creating it first if needed.
    pub fn create_namespace(&self, datacenter: &str, name: &NamespaceName) -> StateResult<Namespace> {
        let key = namespace_key(datacenter, name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let namespace = {
            let mut table = txn.open_table(NAMESPACES).map_err(map_err!(Table))?;
            match read_one::<Namespace, _>(&table, &key)? {
                Some(existing) => existing,
                None => {
                    let all: Vec<Namespace> = read_prefix(&table, "")?;
                    let namespace = Namespace {
                        id: all.iter().map(|ns| ns.id).max().unwrap_or(0) + 1,
                        name: name.clone(),
                        datacenter: datacenter.to_string(),
                    };
                    let value = serde_json::to_vec(&namespace).map_err(map_err!(Encode))?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                    debug!(%key, id = namespace.id, "namespace created");
                    namespace
                }
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(namespace)
    }

    pub fn get_namespace(&self, datacenter: &str, name: &NamespaceName) -> StateResult<Option<Namespace>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NAMESPACES).map_err(map_err!(Table))?;
        read_one(&table, &namespace_key(datacenter, name))
    }

    pub fn list_namespaces(&self) -> StateResult<Vec<Namespace>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NAMESPACES).map_err(map_err!(Table))?;
        read_prefix(&table, "")
    }

    // ── Status history ─────────────────────────────────────────────

    /// Append a status to a deployment's history.
    ///
    /// Rejects `Unknown`, statuses for unknown deployments, and any status
    /// ranked below the current one. Repeating the current rank is allowed.
    pub fn append_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
        message: Option<String>,
        recorded_at: u64,
    ) -> StateResult<StatusRecord> {
        let Some(rank) = status.rank() else {
            return Err(StateError::UnrecordableStatus(status));
        };

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            if deployments
                .get(deployment_key(id).as_str())
                .map_err(map_err!(Read))?
                .is_none()
            {
                return Err(StateError::NotFound(format!("deployment {id}")));
            }

            let mut table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
            let history: Vec<StatusRecord> = read_prefix(&table, &status_prefix(id))?;
            if let Some(current) = history.last() {
                if current.status.rank().is_some_and(|r| r > rank) {
                    return Err(StateError::StatusRegression {
                        deployment: id,
                        from: current.status,
                        to: status,
                    });
                }
            }

            let record = StatusRecord {
                deployment: id,
                status,
                message,
                recorded_at,
            };
            let key = status_key(id, history.len() as u64);
            let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, %status, "deployment status recorded");
        Ok(record)
    }

    /// A deployment's status history, oldest first.
    pub fn list_statuses(&self, id: DeploymentId) -> StateResult<Vec<StatusRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
        read_prefix(&table, &status_prefix(id))
    }

    pub fn latest_status(&self, id: DeploymentId) -> StateResult<Option<StatusRecord>> {
        Ok(self.list_statuses(id)?.pop())
    }

    // ── Traffic shifts ─────────────────────────────────────────────

    /// Start shifting `namespace`'s traffic toward `target`.
    ///
    /// Traffic moves away from the newest live deployment of the same
    /// service that precedes `target`. Returns `None`, storing nothing, when
    /// there is no such deployment. A shift toward `target` that already
    /// exists is returned unchanged.
    pub fn create_traffic_shift(
        &self,
        namespace: NamespaceId,
        target: &Deployment,
        policy: TrafficShiftPolicy,
        duration: Duration,
        now: u64,
    ) -> StateResult<Option<TrafficShift>> {
        let key = traffic_shift_key(namespace, target.id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let shift = {
            let mut shifts = txn.open_table(TRAFFIC_SHIFTS).map_err(map_err!(Table))?;
            if let Some(existing) = read_one::<TrafficShift, _>(&shifts, &key)? {
                debug!(%key, "traffic shift already exists");
                Some(existing)
            } else {
                let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
                let statuses = txn.open_table(STATUSES).map_err(map_err!(Table))?;
                let latest = latest_statuses(&statuses)?;
                let service = target.service_name();

                let all: Vec<Deployment> = read_prefix(&deployments, "")?;
                let previous = all
                    .into_iter()
                    .filter(|d| {
                        d.namespace == namespace
                            && d.id != target.id
                            && d.service_name() == service
                            && (d.deployed_at, d.id) < (target.deployed_at, target.id)
                            && is_live(latest.get(&d.id).copied())
                    })
                    .max_by_key(|d| (d.deployed_at, d.id));

                match previous {
                    None => {
                        debug!(to = target.id, %service, "no previous deployment to shift from");
                        None
                    }
                    Some(from) => {
                        let shift = TrafficShift {
                            namespace,
                            from: from.id,
                            to: target.id,
                            policy,
                            start: now,
                            duration_secs: duration.as_secs(),
                        };
                        let value = serde_json::to_vec(&shift).map_err(map_err!(Encode))?;
                        shifts
                            .insert(key.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                        debug!(%key, from = from.id, to = target.id, %policy, "traffic shift created");
                        Some(shift)
                    }
                }
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(shift)
    }

    pub fn list_traffic_shifts(&self, namespace: NamespaceId) -> StateResult<Vec<TrafficShift>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TRAFFIC_SHIFTS).map_err(map_err!(Table))?;
        read_prefix(&table, &traffic_shift_prefix(namespace))
    }

    // ── Routing ────────────────────────────────────────────────────

    /// The routing graph of `namespace` at unix time `now`, over its live
    /// deployments.
    pub fn routing_graph(&self, namespace: NamespaceId, now: u64) -> StateResult<RoutingGraph> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let deployments = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let statuses = txn.open_table(STATUSES).map_err(map_err!(Table))?;
        let shifts = txn.open_table(TRAFFIC_SHIFTS).map_err(map_err!(Table))?;

        let latest = latest_statuses(&statuses)?;
        let mut live: Vec<Deployment> = read_prefix(&deployments, "")?;
        live.retain(|d| d.namespace == namespace && is_live(latest.get(&d.id).copied()));
        let shifts: Vec<TrafficShift> = read_prefix(&shifts, &traffic_shift_prefix(namespace))?;

        Ok(RoutingGraph::build(&live, &shifts, now))
    }
}

/// Whether a deployment with this latest status can receive traffic.
fn is_live(status: Option<DeploymentStatus>) -> bool {
    !matches!(
        status,
        Some(DeploymentStatus::Failed | DeploymentStatus::Garbage | DeploymentStatus::Terminated)
    )
}

fn read_one<T, R>(table: &R, key: &str) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Every value whose key starts with `prefix`, in key order.
fn read_prefix<T, R>(table: &R, prefix: &str) -> StateResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            results.push(serde_json::from_slice(value.value()).map_err(map_err!(Decode))?);
        }
    }
    Ok(results)
}

/// Latest recorded status of every deployment that has one.
fn latest_statuses<R>(table: &R) -> StateResult<HashMap<DeploymentId, DeploymentStatus>>
where
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let records: Vec<StatusRecord> = read_prefix(table, "")?;
    // Keys sort by deployment then sequence, so later entries win.
    Ok(records
        .into_iter()
        .map(|r| (r.deployment, r.status))
        .collect())
}
