//! Alert opt-outs, published next to the discovery entry.

use nelson_core::routing::alerting_key;
use nelson_core::{AlertOptOut, Datacenter, NamespaceName, StackName};
use nelson_program::ops::discovery;
use nelson_program::Program;

/// Publish the opt-outs for `stack`; nothing is written when there are none.
pub fn write_alert_opt_outs(
    stack: &StackName,
    namespace: &NamespaceName,
    dc: &Datacenter,
    opt_outs: &[AlertOptOut],
) -> Program<()> {
    if opt_outs.is_empty() {
        return Program::pure(());
    }
    let mut names: Vec<&str> = opt_outs.iter().map(|o| o.0.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    match serde_json::to_string(&names) {
        Ok(json) => discovery::put(alerting_key(&dc.domain, namespace, stack), json),
        Err(e) => Program::fail(format!("cannot encode alert opt-outs for {stack}: {e}")),
    }
}

pub fn delete_alert_opt_outs(stack: &StackName, namespace: &NamespaceName, dc: &Datacenter) -> Program<()> {
    discovery::delete(alerting_key(&dc.domain, namespace, stack))
}
