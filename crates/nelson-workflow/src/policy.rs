//! Secret policy provisioning.

use std::collections::BTreeSet;

use nelson_core::policy::policy_name;
use nelson_core::{NamespaceName, PolicyConfig, StackName};
use nelson_program::ops::{logging, secrets};
use nelson_program::Program;

/// Grant `stack` read access to the credentials of `roles`.
pub fn write_policy(
    config: &PolicyConfig,
    stack: &StackName,
    namespace: &NamespaceName,
    roles: &BTreeSet<String>,
) -> Program<()> {
    logging::debug(format!(
        "writing secret policy {} for {} role(s)",
        policy_name(stack, namespace),
        roles.len()
    ))
    .then(secrets::create_policy(config, stack, namespace, roles))
}

pub fn delete_policy(stack: &StackName, namespace: &NamespaceName) -> Program<()> {
    logging::debug(format!(
        "revoking secret policy {}",
        policy_name(stack, namespace)
    ))
    .then(secrets::delete_policy(stack, namespace))
}

#[cfg(test)]
mod tests {
    use nelson_program::Op;

    use super::*;
    use crate::testkit::Script;

    #[test]
    fn write_and_delete_address_the_same_stack() {
        let stack = StackName::new("search", &semver::Version::new(1, 2, 3), "bbbb2222");
        let ns = NamespaceName::new("dev");
        let roles: BTreeSet<String> = ["postgres".to_string()].into();

        let mut script = Script::new();
        script
            .run(write_policy(&PolicyConfig::default(), &stack, &ns, &roles))
            .unwrap();
        script.run(delete_policy(&stack, &ns)).unwrap();

        assert_eq!(
            script.names(),
            vec![
                "logging.debug",
                "secrets.create_policy",
                "logging.debug",
                "secrets.delete_policy"
            ]
        );
        assert_eq!(
            script.ops[0],
            Op::Debug {
                message: "writing secret policy nelson__dev__search--1-2-3--bbbb2222 for 1 role(s)"
                    .to_string()
            }
        );
    }
}
