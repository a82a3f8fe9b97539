//! redb table definitions for the Nelson state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Deployments keyed by `{id:020}`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Namespaces keyed by `{datacenter}/{namespace}`.
pub const NAMESPACES: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");

/// Status history keyed by `{deployment:020}:{seq:020}`. Append-only.
pub const STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("statuses");

/// Traffic shifts keyed by `{namespace:020}:{target:020}`.
pub const TRAFFIC_SHIFTS: TableDefinition<&str, &[u8]> = TableDefinition::new("traffic_shifts");

pub fn deployment_key(id: u64) -> String {
    format!("{id:020}")
}

/// Prefix shared by every status entry of one deployment.
pub fn status_prefix(id: u64) -> String {
    format!("{id:020}:")
}

pub fn status_key(id: u64, seq: u64) -> String {
    format!("{id:020}:{seq:020}")
}

/// Prefix shared by every traffic shift in one namespace.
pub fn traffic_shift_prefix(namespace: u64) -> String {
    format!("{namespace:020}:")
}
