//! End-to-end workflow runs against in-memory backends and an in-memory
//! redb state store.

use std::collections::BTreeSet;
use std::sync::{Arc, Once};

use nelson_core::routing::discovery_key;
use nelson_core::{
    deployment_hash, Datacenter, DeployedUnit, Deployment, DeploymentStatus, DiscoveryTable,
    FeatureVersion, Namespace, NamespaceName, NelsonConfig, Plan, Port, ServiceName, UnitDef,
    UnitKind,
};
use nelson_interpreter::memory::{
    MemoryDiscovery, MemoryLog, MemoryRegistry, MemoryScheduler, MemorySecrets,
};
use nelson_interpreter::{
    Backends, DeployRequest, DeploymentLog, FileDeploymentLog, Interpreter, RunError, Runner,
};
use nelson_program::{ExecResult, RegistryLog, WorkflowError};
use nelson_state::StateStore;
use nelson_workflow::discovery::write_discovery;
use nelson_workflow::status::status;
use nelson_workflow::traffic::create_traffic_shift;

// ── Tracing setup ────────────────────────────────────────────────

static TRACING_INIT: Once = Once::new();

/// Controlled by `RUST_LOG` (e.g. `RUST_LOG=nelson=debug`).
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ── Fixtures ─────────────────────────────────────────────────────

const CONFIG: &str = r#"
[workflow]
default = "magnetar"

[timeouts]
instruction_secs = 10
program_secs = 60

[[datacenters]]
name = "texas"
domain = "service.texas.example.com"
registry = "registry.texas.example.com/mirror"

[datacenters.policy]
pki_path = "pki"

[datacenters.traffic_shift]
policy = "linear"
duration_secs = 600
"#;

struct Harness {
    config: NelsonConfig,
    datacenter: Datacenter,
    namespace: Namespace,
    registry: MemoryRegistry,
    discovery: MemoryDiscovery,
    secrets: MemorySecrets,
    scheduler: MemoryScheduler,
    log: MemoryLog,
    store: StateStore,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let config = NelsonConfig::from_toml_str(CONFIG).unwrap();
        let datacenter = config.datacenter("texas").unwrap().unwrap();
        let store = StateStore::open_in_memory().unwrap();
        let namespace = store
            .create_namespace(&datacenter.name, &NamespaceName::new("dev"))
            .unwrap();
        Self {
            config,
            datacenter,
            namespace,
            registry: MemoryRegistry::new(),
            discovery: MemoryDiscovery::new(),
            secrets: MemorySecrets::new(),
            scheduler: MemoryScheduler::new(),
            log: MemoryLog::new(),
            store,
        }
    }

    fn backends_with_log(&self, log: Arc<dyn DeploymentLog>) -> Backends {
        Backends {
            registry: Arc::new(self.registry.clone()),
            discovery: Arc::new(self.discovery.clone()),
            secrets: Arc::new(self.secrets.clone()),
            log,
            storage: Arc::new(self.store.clone()),
            scheduler: Arc::new(self.scheduler.clone()),
        }
    }

    fn interpreter(&self) -> Interpreter {
        Interpreter::from_config(self.backends_with_log(Arc::new(self.log.clone())), &self.config)
    }

    fn runner(&self) -> Runner {
        Runner::new(self.interpreter())
    }

    /// Store a deployment record for `unit`, as the API layer would before
    /// handing it to a workflow.
    fn store_deployment(&self, unit: &UnitDef, plan: &Plan, workflow: &str) -> Deployment {
        let id = self.store.next_deployment_id().unwrap();
        let deployment = Deployment {
            id,
            unit: DeployedUnit::from(unit),
            plan: plan.name.clone(),
            namespace: self.namespace.id,
            hash: deployment_hash(unit, plan, &self.namespace.name),
            workflow: workflow.to_string(),
            deployed_at: 1_700_000_000 + id,
        };
        self.store.put_deployment(&deployment).unwrap();
        deployment
    }

    async fn deploy(&self, workflow: &str, unit: &UnitDef, plan: &Plan) -> (Deployment, Result<(), RunError>) {
        let deployment = self.store_deployment(unit, plan, workflow);
        let result = self
            .runner()
            .deploy(&DeployRequest {
                workflow: Some(workflow),
                id: deployment.id,
                hash: &deployment.hash,
                unit,
                plan,
                datacenter: &self.datacenter,
                namespace: &self.namespace.name,
            })
            .await;
        (deployment, result)
    }

    fn statuses(&self, deployment: &Deployment) -> Vec<DeploymentStatus> {
        self.store
            .list_statuses(deployment.id)
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect()
    }

    fn discovery_key(&self, deployment: &Deployment) -> String {
        discovery_key(&self.datacenter.domain, &self.namespace.name, &deployment.stack_name())
    }
}

fn service(name: &str, version: &str) -> UnitDef {
    UnitDef {
        name: name.to_string(),
        description: Some(format!("{name} service")),
        version: semver::Version::parse(version).unwrap(),
        kind: UnitKind::Service,
        image: format!("hub.example.com/units/{name}:{version}"),
        ports: vec![Port {
            name: "default".to_string(),
            number: 8080,
            protocol: "http".to_string(),
        }],
        dependencies: Vec::new(),
        resources: ["postgres".to_string()].into_iter().collect::<BTreeSet<_>>(),
    }
}

fn plan() -> Plan {
    Plan {
        name: "default".to_string(),
        cpu: 0.5,
        memory_mib: 512,
        instances: 2,
        traffic_shift: None,
        alert_opt_outs: Vec::new(),
    }
}

// ── Deploy ───────────────────────────────────────────────────────

#[tokio::test]
async fn magnetar_deploys_a_service() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();

    assert_eq!(
        h.statuses(&deployment),
        vec![
            DeploymentStatus::Pending,
            DeploymentStatus::Deploying,
            DeploymentStatus::Deploying,
            DeploymentStatus::Warming,
        ]
    );
    assert_eq!(
        h.registry.pushed().await.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["registry.texas.example.com/mirror/search:1.2.3"]
    );
    assert_eq!(h.scheduler.running().await.len(), 1);
    assert!(h.discovery.get(&h.discovery_key(&deployment)).await.is_some());

    let policy_name = format!("nelson__dev__{}", deployment.stack_name());
    let policy = h.secrets.get(&policy_name).await.unwrap();
    assert_eq!(policy.rules.len(), 2, "one role plus the pki rule");
}

#[tokio::test]
async fn every_status_is_paired_with_a_log_line() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();

    let log = h.log.lines(deployment.id).await;
    for record in h.store.list_statuses(deployment.id).unwrap() {
        let message = record.message.unwrap();
        assert!(log.contains(&message), "status message {message:?} missing from log");
    }
}

#[tokio::test]
async fn canopus_skips_secret_policies() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("Canopus", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();

    assert!(h.secrets.names().await.is_empty());
    assert_eq!(h.statuses(&deployment).last(), Some(&DeploymentStatus::Warming));
}

// ── Traffic shifting ─────────────────────────────────────────────

#[tokio::test]
async fn new_version_shifts_traffic_from_the_previous_one() {
    let h = Harness::new();
    let (first, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();
    assert!(h.store.list_traffic_shifts(h.namespace.id).unwrap().is_empty());

    let (second, result) = h.deploy("magnetar", &service("search", "1.2.4"), &plan()).await;
    result.unwrap();

    let shifts = h.store.list_traffic_shifts(h.namespace.id).unwrap();
    assert_eq!(shifts.len(), 1);
    assert_eq!((shifts[0].from, shifts[0].to), (first.id, second.id));
    assert_eq!(shifts[0].duration_secs, 600);
}

#[tokio::test]
async fn repeating_a_traffic_shift_changes_nothing() {
    let h = Harness::new();
    h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await.1.unwrap();
    let (second, result) = h.deploy("magnetar", &service("search", "1.2.4"), &plan()).await;
    result.unwrap();
    let before = h.store.list_traffic_shifts(h.namespace.id).unwrap();

    let settings = h.datacenter.traffic_shift;
    h.interpreter()
        .run(create_traffic_shift(
            second.id,
            &h.namespace.name,
            &h.datacenter,
            settings.policy,
            settings.duration(),
        ))
        .await
        .unwrap();

    assert_eq!(h.store.list_traffic_shifts(h.namespace.id).unwrap(), before);
}

#[tokio::test]
async fn unknown_namespace_skips_traffic_shift() {
    let h = Harness::new();
    let (deployment, _) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;

    h.interpreter()
        .run(create_traffic_shift(
            deployment.id,
            &NamespaceName::new("nowhere"),
            &h.datacenter,
            h.datacenter.traffic_shift.policy,
            h.datacenter.traffic_shift.duration(),
        ))
        .await
        .unwrap();

    assert!(h.store.list_traffic_shifts(h.namespace.id).unwrap().is_empty());
}

// ── Discovery ────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_routes_callers_to_their_dependencies() {
    let h = Harness::new();
    let (search, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();

    let mut frontend = service("frontend", "2.0.0");
    frontend.dependencies = vec![ServiceName::new("search", FeatureVersion { major: 1, minor: 2 })];
    let (caller, result) = h.deploy("magnetar", &frontend, &plan()).await;
    result.unwrap();

    let published = h.discovery.get(&h.discovery_key(&caller)).await.unwrap();
    let table: DiscoveryTable = serde_json::from_str(&published).unwrap();
    assert_eq!(table.routes.len(), 1);
    assert_eq!(table.routes[0].service, "search@1.2");
    assert_eq!(table.routes[0].targets[0].stack, search.stack_name().to_string());
}

#[tokio::test]
async fn republishing_discovery_is_deterministic() {
    let h = Harness::new();
    h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await.1.unwrap();
    let mut frontend = service("frontend", "2.0.0");
    frontend.dependencies = vec![ServiceName::new("search", FeatureVersion { major: 1, minor: 2 })];
    let (caller, result) = h.deploy("magnetar", &frontend, &plan()).await;
    result.unwrap();

    let key = h.discovery_key(&caller);
    let first = h.discovery.get(&key).await.unwrap();
    h.interpreter()
        .run(write_discovery(
            caller.id,
            &caller.stack_name(),
            &h.namespace.name,
            &h.datacenter,
        ))
        .await
        .unwrap();
    let second = h.discovery.get(&key).await.unwrap();

    assert_eq!(first, second);
}

// ── Failure handling ─────────────────────────────────────────────

#[tokio::test]
async fn failed_promotion_records_failed_status() {
    let h = Harness::new();
    h.registry
        .set_pull(ExecResult::new(0, vec![RegistryLog::error("disk full")]))
        .await;

    let (deployment, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;

    let message = match result {
        Err(RunError::Workflow(WorkflowError::Failed(message))) => message,
        other => panic!("expected a workflow failure, got {other:?}"),
    };
    assert!(message.contains("disk full"), "{message}");

    let latest = h.store.latest_status(deployment.id).unwrap().unwrap();
    assert_eq!(latest.status, DeploymentStatus::Failed);
    assert_eq!(latest.message.as_deref(), Some(message.as_str()));
    assert_eq!(h.log.lines(deployment.id).await.last(), Some(&message));
    assert!(h.scheduler.running().await.is_empty());
}

#[tokio::test]
async fn unknown_workflow_is_rejected_before_running() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("nonexistent", &service("search", "1.2.3"), &plan()).await;

    assert!(matches!(result, Err(RunError::WorkflowNotFound { .. })));
    assert!(h.statuses(&deployment).is_empty());
}

#[tokio::test]
async fn rejected_status_never_reaches_the_log() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();
    let lines_before = h.log.lines(deployment.id).await;

    let err = h
        .interpreter()
        .run(status(deployment.id, DeploymentStatus::Pending, "rewinding"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("cannot move from warming back to pending"), "{err}");
    assert_eq!(h.log.lines(deployment.id).await, lines_before);
    assert_eq!(h.statuses(&deployment).last(), Some(&DeploymentStatus::Warming));
}

// ── Configuration ────────────────────────────────────────────────

#[tokio::test]
async fn request_without_workflow_uses_configured_default() {
    let h = Harness::new();
    let mut config = h.config.clone();
    config.workflow.default = "canopus".to_string();
    let runner = Runner::from_config(h.backends_with_log(Arc::new(h.log.clone())), &config);

    let unit = service("search", "1.2.3");
    let plan = plan();
    let deployment = h.store_deployment(&unit, &plan, "canopus");
    runner
        .deploy(&DeployRequest {
            workflow: None,
            id: deployment.id,
            hash: &deployment.hash,
            unit: &unit,
            plan: &plan,
            datacenter: &h.datacenter,
            namespace: &h.namespace.name,
        })
        .await
        .unwrap();

    let log = h.log.lines(deployment.id).await;
    assert_eq!(log.first().map(String::as_str), Some("canopus workflow about to start"));
    assert!(h.secrets.names().await.is_empty());
}

#[tokio::test]
async fn unknown_configured_default_is_reported() {
    let h = Harness::new();
    let runner = Runner::new(h.interpreter()).with_default_workflow("pulsar");
    let unit = service("search", "1.2.3");
    let plan = plan();
    let deployment = h.store_deployment(&unit, &plan, "pulsar");

    let result = runner
        .deploy(&DeployRequest {
            workflow: None,
            id: deployment.id,
            hash: &deployment.hash,
            unit: &unit,
            plan: &plan,
            datacenter: &h.datacenter,
            namespace: &h.namespace.name,
        })
        .await;

    match result {
        Err(RunError::WorkflowNotFound { name, .. }) => assert_eq!(name, "pulsar"),
        other => panic!("expected an unknown workflow, got {other:?}"),
    }
}

// ── Destroy ──────────────────────────────────────────────────────

#[tokio::test]
async fn destroy_unwinds_a_magnetar_deploy() {
    let h = Harness::new();
    let (deployment, result) = h.deploy("magnetar", &service("search", "1.2.3"), &plan()).await;
    result.unwrap();

    h.runner()
        .destroy(&deployment, &h.datacenter, &h.namespace)
        .await
        .unwrap();

    assert_eq!(h.statuses(&deployment).last(), Some(&DeploymentStatus::Terminated));
    assert!(h.discovery.keys().await.is_empty());
    assert!(h.secrets.names().await.is_empty());
    assert!(h.scheduler.running().await.is_empty());
}

// ── File-backed deployment log ───────────────────────────────────

#[tokio::test]
async fn deployment_log_can_live_on_disk() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let file_log = FileDeploymentLog::new(dir.path()).unwrap();
    let runner = Runner::new(Interpreter::new(h.backends_with_log(Arc::new(file_log.clone()))));

    let unit = service("search", "1.2.3");
    let plan = plan();
    let deployment = h.store_deployment(&unit, &plan, "magnetar");
    runner
        .deploy(&DeployRequest {
            workflow: Some("magnetar"),
            id: deployment.id,
            hash: &deployment.hash,
            unit: &unit,
            plan: &plan,
            datacenter: &h.datacenter,
            namespace: &h.namespace.name,
        })
        .await
        .unwrap();

    let contents = std::fs::read_to_string(file_log.path_for(deployment.id)).unwrap();
    assert_eq!(contents.lines().next(), Some("magnetar workflow about to start"));
    assert!(contents.lines().last().unwrap_or_default().contains("waiting for it to become ready"));
}
