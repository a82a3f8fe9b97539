//! nelson-state: embedded state store for Nelson.
//!
//! Backed by [redb](https://docs.rs/redb), holds deployments, namespaces,
//! the append-only status history and traffic shifts. It is the durable
//! storage collaborator behind the workflow `storage.*` instructions.
//!
//! # Architecture
//!
//! Domain types from `nelson-core` are JSON-serialized into redb's `&[u8]`
//! value columns. Numeric ids are zero-padded in keys so that lexical
//! order is numeric order, and composite keys (`{deployment}:{seq}`,
//! `{namespace}:{target}`) allow prefix scans for related records.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
