//! Traffic shift activation.
//!
//! The shift record itself, and whether there is anything to shift from,
//! is the storage backend's business: creating the same shift twice
//! leaves one record.

use std::time::Duration;

use nelson_core::{Datacenter, DeploymentId, NamespaceName, TrafficShiftPolicy};
use nelson_program::ops::{logging, storage};
use nelson_program::Program;

/// Start shifting traffic toward deployment `id` in `namespace`.
///
/// When the namespace is not known in `dc` the program ends successfully
/// without doing anything.
pub fn create_traffic_shift(
    id: DeploymentId,
    namespace: &NamespaceName,
    dc: &Datacenter,
    policy: TrafficShiftPolicy,
    duration: Duration,
) -> Program<()> {
    storage::get_namespace(&dc.name, namespace)
        .and_then_some(move |ns| {
            storage::get_deployment(id)
                .map(move |deployment| (ns, deployment))
                .some()
        })
        .and_then_some(move |(ns, deployment)| {
            let message = format!(
                "shifting {} traffic to {} in {} ({policy} over {}s)",
                deployment.service_name(),
                deployment.stack_name(),
                ns.name,
                duration.as_secs()
            );
            logging::debug(message)
                .then(storage::create_traffic_shift(ns.id, &deployment, policy, duration))
                .some()
        })
        .void()
}
