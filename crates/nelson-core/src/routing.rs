//! Routing graph and the discovery tables derived from it.
//!
//! The routing graph has one node per live deployment and one edge per
//! (caller, callee port) pair, where the callee implements a service the
//! caller depends on. A deployment's discovery table is the projection of
//! its outgoing edges into the shape service-discovery clients consume.
//!
//! Both structures are ordered so that the same inputs always serialize
//! to the same bytes.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::naming::{ServiceName, StackName};
use crate::types::{Deployment, NamespaceName, Port, TrafficShift};

/// Discovery-store key under which a stack's table is published.
pub fn discovery_key(domain: &str, namespace: &NamespaceName, stack: &StackName) -> String {
    format!("lighthouse/discovery/v1/{domain}/{namespace}/{stack}")
}

/// Discovery-store key under which a stack's alert opt-outs are published.
pub fn alerting_key(domain: &str, namespace: &NamespaceName, stack: &StackName) -> String {
    format!("nelson/alerting/v1/{domain}/{namespace}/{stack}")
}

/// A weighted route from one stack to a port of another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteEdge {
    pub from: StackName,
    pub to: StackName,
    pub service: ServiceName,
    pub port: Port,
    /// Share of the caller's traffic for `service` (0-100).
    pub weight: u32,
}

/// Directed graph of routes between live deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingGraph {
    edges: Vec<RouteEdge>,
}

impl RoutingGraph {
    pub fn new(mut edges: Vec<RouteEdge>) -> Self {
        edges.sort();
        edges.dedup();
        Self { edges }
    }

    pub fn edges(&self) -> &[RouteEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges leaving `from`, in stable order. Only the graph stays borrowed.
    pub fn outgoing<'a>(&'a self, from: &StackName) -> impl Iterator<Item = &'a RouteEdge> + use<'a> {
        let from = from.clone();
        self.edges.iter().filter(move |e| e.from == from)
    }

    /// Derive the graph for a namespace from its live deployments and
    /// traffic shifts, evaluating shift weights at unix time `now`.
    ///
    /// Each dependency resolves to the newest deployment of that service.
    /// When a shift targets that deployment, the previous deployment keeps
    /// the remaining share; a zero-weight side is left out.
    pub fn build(deployments: &[Deployment], shifts: &[TrafficShift], now: u64) -> Self {
        let mut by_service: HashMap<ServiceName, Vec<&Deployment>> = HashMap::new();
        for d in deployments {
            by_service.entry(d.service_name()).or_default().push(d);
        }
        for candidates in by_service.values_mut() {
            candidates.sort_by(|a, b| b.deployed_at.cmp(&a.deployed_at).then(b.id.cmp(&a.id)));
        }
        let by_id: HashMap<u64, &Deployment> = deployments.iter().map(|d| (d.id, d)).collect();

        let mut edges = Vec::new();
        for caller in deployments {
            let from = caller.stack_name();
            for service in &caller.unit.dependencies {
                let Some(newest) = by_service.get(service).and_then(|c| c.first()) else {
                    continue;
                };

                let shift = shifts
                    .iter()
                    .find(|s| s.to == newest.id && s.namespace == newest.namespace);
                let targets: Vec<(&Deployment, u32)> = match shift {
                    Some(s) => {
                        let (from_weight, to_weight) = s.weights_at(now);
                        let mut t = vec![(*newest, to_weight)];
                        if let Some(previous) = by_id.get(&s.from) {
                            t.push((*previous, from_weight));
                        }
                        t
                    }
                    None => vec![(*newest, 100)],
                };

                for (target, weight) in targets {
                    if weight == 0 || target.id == caller.id {
                        continue;
                    }
                    for port in &target.unit.ports {
                        edges.push(RouteEdge {
                            from: from.clone(),
                            to: target.stack_name(),
                            service: service.clone(),
                            port: port.clone(),
                            weight,
                        });
                    }
                }
            }
        }

        Self::new(edges)
    }
}

/// One target of a discovery route.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveryTarget {
    pub stack: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
}

/// All targets serving one (service, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRoute {
    pub service: String,
    pub port_name: String,
    pub protocol: String,
    pub targets: Vec<DiscoveryTarget>,
}

/// What a deployment needs to find its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryTable {
    pub domain: String,
    pub namespace: String,
    pub routes: Vec<DiscoveryRoute>,
}

impl DiscoveryTable {
    /// Project the outgoing edges of `root` into a discovery table.
    pub fn compute(
        root: &StackName,
        graph: &RoutingGraph,
        domain: &str,
        namespace: &NamespaceName,
    ) -> Self {
        let mut grouped: BTreeMap<(ServiceName, String), (String, Vec<DiscoveryTarget>)> =
            BTreeMap::new();
        for edge in graph.outgoing(root) {
            let entry = grouped
                .entry((edge.service.clone(), edge.port.name.clone()))
                .or_insert_with(|| (edge.port.protocol.clone(), Vec::new()));
            entry.1.push(DiscoveryTarget {
                stack: edge.to.to_string(),
                host: format!("{}.{namespace}.{domain}", edge.to),
                port: edge.port.number,
                weight: edge.weight,
            });
        }

        let routes = grouped
            .into_iter()
            .map(|((service, port_name), (protocol, mut targets))| {
                targets.sort();
                DiscoveryRoute {
                    service: service.to_string(),
                    port_name,
                    protocol,
                    targets,
                }
            })
            .collect();

        Self {
            domain: domain.to_string(),
            namespace: namespace.to_string(),
            routes,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeployedUnit, TrafficShiftPolicy};

    fn port(name: &str, number: u16) -> Port {
        Port {
            name: name.to_string(),
            number,
            protocol: "http".to_string(),
        }
    }

    fn deployment(id: u64, name: &str, version: &str, deps: &[&str], at: u64) -> Deployment {
        Deployment {
            id,
            unit: DeployedUnit {
                name: name.to_string(),
                version: semver::Version::parse(version).unwrap(),
                ports: vec![port("default", 8080)],
                dependencies: deps.iter().map(|d| d.parse().unwrap()).collect(),
            },
            plan: "default".to_string(),
            namespace: 1,
            hash: format!("h{id:07}"),
            workflow: "magnetar".to_string(),
            deployed_at: at,
        }
    }

    #[test]
    fn routes_to_newest_deployment() {
        let frontend = deployment(1, "frontend", "1.0.0", &["search@2.1"], 100);
        let old = deployment(2, "search", "2.1.0", &[], 100);
        let new = deployment(3, "search", "2.1.1", &[], 200);
        let graph = RoutingGraph::build(&[frontend.clone(), old, new.clone()], &[], 300);

        let out: Vec<_> = graph.outgoing(&frontend.stack_name()).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, new.stack_name());
        assert_eq!(out[0].weight, 100);
    }

    #[test]
    fn unresolved_dependency_has_no_edge() {
        let frontend = deployment(1, "frontend", "1.0.0", &["billing@1.0"], 100);
        let graph = RoutingGraph::build(&[frontend], &[], 300);
        assert!(graph.is_empty());
    }

    #[test]
    fn shift_splits_weight_between_versions() {
        let frontend = deployment(1, "frontend", "1.0.0", &["search@2.1"], 100);
        let old = deployment(2, "search", "2.1.0", &[], 100);
        let new = deployment(3, "search", "2.1.1", &[], 200);
        let shift = TrafficShift {
            namespace: 1,
            from: 2,
            to: 3,
            policy: TrafficShiftPolicy::Linear,
            start: 200,
            duration_secs: 100,
        };
        let graph = RoutingGraph::build(&[frontend.clone(), old.clone(), new.clone()], &[shift], 230);

        let weights: Vec<(StackName, u32)> = graph
            .outgoing(&frontend.stack_name())
            .map(|e| (e.to.clone(), e.weight))
            .collect();
        assert!(weights.contains(&(old.stack_name(), 70)));
        assert!(weights.contains(&(new.stack_name(), 30)));
    }

    #[test]
    fn discovery_table_groups_by_service_and_port() {
        let frontend = deployment(1, "frontend", "1.0.0", &["search@2.1"], 100);
        let mut search = deployment(2, "search", "2.1.0", &[], 100);
        search.unit.ports.push(port("admin", 9090));
        let graph = RoutingGraph::build(&[frontend.clone(), search.clone()], &[], 300);

        let table = DiscoveryTable::compute(
            &frontend.stack_name(),
            &graph,
            "dc1.example.com",
            &NamespaceName::new("dev"),
        );
        assert_eq!(table.routes.len(), 2);
        assert_eq!(table.routes[0].port_name, "admin");
        assert_eq!(table.routes[1].port_name, "default");
        assert_eq!(
            table.routes[1].targets[0].host,
            format!("{}.dev.dc1.example.com", search.stack_name())
        );
    }

    #[test]
    fn discovery_table_is_deterministic() {
        let frontend = deployment(1, "frontend", "1.0.0", &["search@2.1", "auth@1.0"], 100);
        let search = deployment(2, "search", "2.1.0", &[], 100);
        let auth = deployment(3, "auth", "1.0.3", &[], 100);
        let ns = NamespaceName::new("dev");

        let a = RoutingGraph::build(&[frontend.clone(), search.clone(), auth.clone()], &[], 300);
        let b = RoutingGraph::build(&[auth, search, frontend.clone()], &[], 300);
        let ta = DiscoveryTable::compute(&frontend.stack_name(), &a, "dc1", &ns);
        let tb = DiscoveryTable::compute(&frontend.stack_name(), &b, "dc1", &ns);
        assert_eq!(ta.to_json().unwrap(), tb.to_json().unwrap());
    }

    #[test]
    fn keys_embed_domain_namespace_and_stack() {
        let stack = StackName::new("search", &semver::Version::new(1, 0, 0), "abc");
        let ns = NamespaceName::new("dev");
        assert_eq!(
            discovery_key("dc1.example.com", &ns, &stack),
            "lighthouse/discovery/v1/dc1.example.com/dev/search--1-0-0--abc"
        );
        assert_eq!(
            alerting_key("dc1.example.com", &ns, &stack),
            "nelson/alerting/v1/dc1.example.com/dev/search--1-0-0--abc"
        );
    }
}
