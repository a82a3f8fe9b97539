//! nelson-core: shared domain model for the Nelson deployment control plane.
//!
//! Everything here is plain data plus pure functions over it: units and
//! plans, datacenters and namespaces, deployments and their lifecycle
//! status, registry image references, the routing graph and the discovery
//! table derived from it, secret-policy rendering, and TOML configuration.
//!
//! Nothing in this crate performs I/O other than [`NelsonConfig::from_file`].

pub mod config;
pub mod error;
pub mod image;
pub mod naming;
pub mod policy;
pub mod routing;
pub mod types;

pub use config::NelsonConfig;
pub use error::{CoreError, CoreResult};
pub use image::{Image, RegistryUri};
pub use naming::{deployment_hash, FeatureVersion, ServiceName, StackName};
pub use policy::{PolicyConfig, PolicyRule, SecretPolicy};
pub use routing::{DiscoveryRoute, DiscoveryTable, DiscoveryTarget, RouteEdge, RoutingGraph};
pub use types::*;
