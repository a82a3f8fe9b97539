//! Secret-access policies granted to deployments.
//!
//! A datacenter's [`PolicyConfig`] is a template; rendering it for a stack
//! yields the [`SecretPolicy`] the secrets store is asked to create. The
//! policy name is a pure function of stack and namespace so the matching
//! revoke can address it without reading anything back.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::naming::StackName;
use crate::types::NamespaceName;

/// Template for the policies provisioned in one datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Credential path template. `%env%`, `%resource%` and `%unit%` are
    /// replaced by namespace, resource name and unit name.
    pub resource_creds_path: String,
    /// PKI mount the deployment may issue certificates from.
    pub pki_path: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            resource_creds_path: "%env%/%resource%/creds/%unit%".to_string(),
            pki_path: None,
        }
    }
}

impl PolicyConfig {
    /// Render the policy for `stack` in `namespace`, granting read access to
    /// the credentials of each role in `roles`.
    pub fn render(
        &self,
        stack: &StackName,
        namespace: &NamespaceName,
        roles: &BTreeSet<String>,
    ) -> SecretPolicy {
        let mut rules: Vec<PolicyRule> = roles
            .iter()
            .map(|role| PolicyRule {
                path: self
                    .resource_creds_path
                    .replace("%env%", namespace.as_str())
                    .replace("%resource%", role)
                    .replace("%unit%", &stack.service_type),
                capabilities: vec!["read".to_string()],
            })
            .collect();

        if let Some(pki) = &self.pki_path {
            rules.push(PolicyRule {
                path: format!("{pki}/issue/{namespace}"),
                capabilities: vec!["create".to_string(), "update".to_string()],
            });
        }

        SecretPolicy {
            name: policy_name(stack, namespace),
            rules,
        }
    }
}

/// Name under which a stack's policy is stored.
pub fn policy_name(stack: &StackName, namespace: &NamespaceName) -> String {
    format!("nelson__{namespace}__{stack}")
}

/// A single path grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub path: String,
    pub capabilities: Vec<String>,
}

/// A rendered, named policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPolicy {
    pub name: String,
    pub rules: Vec<PolicyRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> StackName {
        StackName::new("search", &semver::Version::new(1, 4, 2), "3f9a01bc")
    }

    #[test]
    fn renders_one_rule_per_role() {
        let roles: BTreeSet<String> = ["mysql", "s3"].iter().map(|s| s.to_string()).collect();
        let policy = PolicyConfig::default().render(&stack(), &NamespaceName::new("dev"), &roles);

        assert_eq!(policy.name, "nelson__dev__search--1-4-2--3f9a01bc");
        let paths: Vec<&str> = policy.rules.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["dev/mysql/creds/search", "dev/s3/creds/search"]);
    }

    #[test]
    fn pki_rule_is_appended() {
        let cfg = PolicyConfig {
            pki_path: Some("pki".to_string()),
            ..Default::default()
        };
        let policy = cfg.render(&stack(), &NamespaceName::new("qa"), &BTreeSet::new());
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].path, "pki/issue/qa");
    }
}
