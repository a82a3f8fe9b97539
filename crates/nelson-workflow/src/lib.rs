//! Nelson workflows: how a unit is deployed and decommissioned.
//!
//! A workflow is a named strategy that, given a deployment's inputs,
//! builds one [`Program`](nelson_program::Program) describing the whole
//! deploy (or destroy) procedure. Nothing here talks to a backend; the
//! interpreter does that.
//!
//! # Components
//!
//! - **`strategy`**: the [`Workflow`] trait and the name registry
//! - **`status`**: paired log line + status record
//! - **`promotion`**: pull/tag/push an image into the datacenter registry
//! - **`discovery`**: publish or withdraw a deployment's discovery table
//! - **`traffic`**: start a traffic shift toward a new deployment
//! - **`policy`**, **`alerts`**: secret policies and alert opt-outs
//! - **`magnetar`**, **`canopus`**: the two built-in workflows

pub mod alerts;
pub mod canopus;
pub mod discovery;
pub mod magnetar;
pub mod policy;
pub mod promotion;
pub mod status;
pub mod strategy;
pub mod traffic;

#[cfg(test)]
mod testkit;

pub use canopus::Canopus;
pub use magnetar::Magnetar;
pub use strategy::{DynWorkflow, Workflow};
