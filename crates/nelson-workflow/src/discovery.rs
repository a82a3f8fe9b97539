//! Discovery publication.

use nelson_core::routing::discovery_key;
use nelson_core::{Datacenter, DeploymentId, DiscoveryTable, NamespaceName, StackName};
use nelson_program::ops::{discovery, storage};
use nelson_program::Program;

/// Compute the discovery table for deployment `id` from its namespace's
/// routing graph and publish it under the stack's discovery key.
pub fn write_discovery(
    id: DeploymentId,
    stack: &StackName,
    namespace: &NamespaceName,
    dc: &Datacenter,
) -> Program<()> {
    let key = discovery_key(&dc.domain, namespace, stack);
    let domain = dc.domain.clone();
    let namespace = namespace.clone();

    storage::get_deployment(id)
        .and_then(|deployment| {
            storage::routing_graph(deployment.namespace).map(move |graph| (deployment, graph))
        })
        .and_then(move |(deployment, graph)| {
            let root = deployment.stack_name();
            let table = DiscoveryTable::compute(&root, &graph, &domain, &namespace);
            match table.to_json() {
                Ok(json) => discovery::put(key, json),
                Err(e) => Program::fail(format!("cannot encode discovery table for {root}: {e}")),
            }
        })
}

/// Withdraw the stack's discovery entry.
pub fn delete_discovery(stack: &StackName, namespace: &NamespaceName, dc: &Datacenter) -> Program<()> {
    discovery::delete(discovery_key(&dc.domain, namespace, stack))
}
