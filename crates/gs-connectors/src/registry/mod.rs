//! Access-management registry connector.
//!
//! The registry is the system of record for bastion assets and their
//! relational resources (admin credentials, gateway domains, labels, node
//! tree, system users). This module provides the logical API trait, its HTTP
//! and in-memory implementations, a per-run catalog cache with name/id
//! resolvers, and the asynchronous task confirmation machinery.

pub mod api;
pub mod catalog;
pub mod client;
pub mod mock;
pub mod nodes;
pub mod resources;
pub mod tasks;

pub use api::RegistryApi;
pub use catalog::Catalog;
pub use client::RegistryClient;
pub use mock::MockRegistry;
pub use resources::{
    AdminUserRecord, AssetPayload, AssetRecord, DomainRecord, LabelRecord, NodeRecord,
    SystemUserRecord,
};
pub use tasks::{ConfirmOptions, TaskMonitor, TaskOutcome};
