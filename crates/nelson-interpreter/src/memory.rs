//! In-memory backends for testing and local runs.
//!
//! Each backend keeps its state behind `Arc<RwLock<..>>`, so clones share
//! state: hand one clone to [`Backends`](crate::Backends) and keep another
//! to inspect what the program did.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use nelson_core::{
    Datacenter, Deployment, DeploymentId, Image, NamespaceName, Plan, RegistryUri, SecretPolicy,
    UnitDef,
};
use nelson_program::{ExecResult, LaunchHandle, TagResult};

use crate::backend::{DeploymentLog, DiscoveryStore, RegistryClient, SchedulerBackend, SecretsStore};
use crate::error::{BackendError, BackendResult};

// ── Registry ───────────────────────────────────────────────────────

/// Canned registry results.
#[derive(Debug, Clone)]
struct RegistryScript {
    pull: ExecResult,
    push: ExecResult,
    tag_exit: i32,
}

/// Registry that answers from a script; every step succeeds by default.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    script: Arc<RwLock<RegistryScript>>,
    pushed: Arc<RwLock<Vec<Image>>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self {
            script: Arc::new(RwLock::new(RegistryScript {
                pull: ExecResult::new(0, Vec::new()),
                push: ExecResult::new(0, Vec::new()),
                tag_exit: 0,
            })),
            pushed: Arc::default(),
        }
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_pull(&self, result: ExecResult) {
        self.script.write().await.pull = result;
    }

    pub async fn set_push(&self, result: ExecResult) {
        self.script.write().await.push = result;
    }

    pub async fn set_tag_exit(&self, code: i32) {
        self.script.write().await.tag_exit = code;
    }

    /// Images pushed so far, in order.
    pub async fn pushed(&self) -> Vec<Image> {
        self.pushed.read().await.clone()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn extract(&self, unit: &UnitDef) -> BackendResult<Image> {
        Image::parse(&unit.image).map_err(|e| BackendError::failed(e.to_string()))
    }

    async fn pull(&self, _image: &Image) -> BackendResult<ExecResult> {
        Ok(self.script.read().await.pull.clone())
    }

    async fn tag(&self, image: &Image, registry: &RegistryUri) -> BackendResult<TagResult> {
        let image = image
            .retarget(registry)
            .map_err(|e| BackendError::failed(e.to_string()))?;
        Ok(TagResult {
            exit_code: self.script.read().await.tag_exit,
            image,
        })
    }

    async fn push(&self, image: &Image) -> BackendResult<ExecResult> {
        let result = self.script.read().await.push.clone();
        if result.succeeded() {
            self.pushed.write().await.push(image.clone());
        }
        Ok(result)
    }
}

// ── Discovery ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryDiscovery {
    data: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.data.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DiscoveryStore for MemoryDiscovery {
    async fn put(&self, key: &str, value: &str) -> BackendResult<()> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

// ── Secrets ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemorySecrets {
    policies: Arc<RwLock<BTreeMap<String, SecretPolicy>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<SecretPolicy> {
        self.policies.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.policies.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl SecretsStore for MemorySecrets {
    async fn write_policy(&self, policy: &SecretPolicy) -> BackendResult<()> {
        self.policies
            .write()
            .await
            .insert(policy.name.clone(), policy.clone());
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> BackendResult<()> {
        self.policies.write().await.remove(name);
        Ok(())
    }
}

// ── Deployment log ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<RwLock<BTreeMap<DeploymentId, Vec<String>>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lines(&self, id: DeploymentId) -> Vec<String> {
        self.lines.read().await.get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DeploymentLog for MemoryLog {
    async fn append(&self, id: DeploymentId, line: &str) -> BackendResult<()> {
        self.lines
            .write()
            .await
            .entry(id)
            .or_default()
            .push(line.to_string());
        Ok(())
    }
}

// ── Scheduler ──────────────────────────────────────────────────────

/// Scheduler that tracks which stacks are running in which datacenter.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduler {
    running: Arc<RwLock<BTreeSet<(String, String)>>>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(datacenter, stack)` pairs currently running.
    pub async fn running(&self) -> Vec<(String, String)> {
        self.running.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl SchedulerBackend for MemoryScheduler {
    async fn launch(
        &self,
        _image: &Image,
        datacenter: &Datacenter,
        _namespace: &NamespaceName,
        unit: &UnitDef,
        _plan: &Plan,
        hash: &str,
    ) -> BackendResult<LaunchHandle> {
        let stack = unit.stack_name(hash).to_string();
        self.running
            .write()
            .await
            .insert((datacenter.name.clone(), stack.clone()));
        Ok(LaunchHandle(format!("{}/{stack}", datacenter.name)))
    }

    async fn delete(&self, datacenter: &Datacenter, deployment: &Deployment) -> BackendResult<()> {
        let key = (datacenter.name.clone(), deployment.stack_name().to_string());
        if !self.running.write().await.remove(&key) {
            return Err(BackendError::NotFound(format!(
                "{} is not running in {}",
                key.1, key.0
            )));
        }
        Ok(())
    }
}
