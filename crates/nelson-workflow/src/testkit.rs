//! Fixtures and a scripted synchronous handler for workflow tests.

use std::collections::BTreeSet;

use nelson_core::{
    Datacenter, DeployedUnit, Deployment, DeploymentId, Image, Namespace, NamespaceName, Plan,
    PolicyConfig, Port, RegistryUri, RoutingGraph, TrafficShiftSettings, UnitDef, UnitKind,
};
use nelson_program::{
    ExecResult, LaunchHandle, Op, Outcome, Program, TagResult, WorkflowError,
};

pub fn unit(name: &str, version: &str) -> UnitDef {
    UnitDef {
        name: name.to_string(),
        description: None,
        version: semver::Version::parse(version).unwrap(),
        kind: UnitKind::Service,
        image: format!("hub.example.com/units/{name}:{version}"),
        ports: vec![Port {
            name: "default".to_string(),
            number: 8080,
            protocol: "http".to_string(),
        }],
        dependencies: Vec::new(),
        resources: BTreeSet::new(),
    }
}

pub fn job(name: &str, version: &str) -> UnitDef {
    UnitDef {
        kind: UnitKind::Job,
        ports: Vec::new(),
        ..unit(name, version)
    }
}

pub fn plan() -> Plan {
    Plan {
        name: "default".to_string(),
        cpu: 0.5,
        memory_mib: 512,
        instances: 2,
        traffic_shift: None,
        alert_opt_outs: Vec::new(),
    }
}

pub fn datacenter() -> Datacenter {
    Datacenter {
        name: "texas".to_string(),
        domain: "service.texas.example.com".to_string(),
        registry: RegistryUri::new("registry.texas.example.com/mirror"),
        policy: PolicyConfig::default(),
        traffic_shift: TrafficShiftSettings::default(),
    }
}

pub fn namespace() -> Namespace {
    Namespace {
        id: 3,
        name: NamespaceName::new("dev"),
        datacenter: "texas".to_string(),
    }
}

pub fn deployment(id: DeploymentId, unit: &UnitDef, hash: &str) -> Deployment {
    Deployment {
        id,
        unit: DeployedUnit::from(unit),
        plan: "default".to_string(),
        namespace: 3,
        hash: hash.to_string(),
        workflow: "magnetar".to_string(),
        deployed_at: 1_700_000_000,
    }
}

/// Answers each instruction from canned results and records what it saw.
pub struct Script {
    pub pull: ExecResult,
    pub push: ExecResult,
    pub tag_exit: i32,
    pub namespace: Option<Namespace>,
    pub deployment: Option<Deployment>,
    pub graph: RoutingGraph,
    pub ops: Vec<Op>,
}

impl Script {
    pub fn new() -> Self {
        Self {
            pull: ExecResult::new(0, Vec::new()),
            push: ExecResult::new(0, Vec::new()),
            tag_exit: 0,
            namespace: Some(namespace()),
            deployment: None,
            graph: RoutingGraph::default(),
            ops: Vec::new(),
        }
    }

    pub fn handle(&mut self, op: &Op) -> Result<Outcome, WorkflowError> {
        self.ops.push(op.clone());
        let outcome = match op {
            Op::Extract { unit } => Outcome::Image(
                Image::parse(&unit.image)
                    .map_err(|e| WorkflowError::instruction(op.name(), e.to_string()))?,
            ),
            Op::Pull { .. } => Outcome::Exec(self.pull.clone()),
            Op::Tag { image, registry } => Outcome::Tagged(TagResult {
                exit_code: self.tag_exit,
                image: image
                    .retarget(registry)
                    .map_err(|e| WorkflowError::instruction(op.name(), e.to_string()))?,
            }),
            Op::Push { .. } => Outcome::Exec(self.push.clone()),
            Op::GetDeployment { id } => match &self.deployment {
                Some(d) => Outcome::Deployment(Box::new(d.clone())),
                None => {
                    return Err(WorkflowError::instruction(
                        op.name(),
                        format!("deployment {id} not found"),
                    ));
                }
            },
            Op::GetNamespace { .. } => Outcome::Namespace(self.namespace.clone()),
            Op::RoutingGraph { .. } => Outcome::RoutingGraph(self.graph.clone()),
            Op::Launch { .. } => Outcome::Launched(LaunchHandle("texas/alloc-1".to_string())),
            _ => Outcome::Unit,
        };
        Ok(outcome)
    }

    pub fn run<T: 'static>(&mut self, program: Program<T>) -> Result<T, WorkflowError> {
        program.run_with(|op| self.handle(op))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.ops.iter().map(Op::name).collect()
    }

    /// Messages written to the deployment log, in order.
    pub fn log_lines(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::LogToFile { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}
