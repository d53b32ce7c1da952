//! # gs-connectors
//!
//! Connectors for the access-management registry, cloud inventory providers,
//! and the inbound task queue.
//!
//! This crate provides the trait definitions and implementations for talking
//! to the external systems gatesync reconciles between.

pub mod cloud;
pub mod http;
pub mod queue;
pub mod registry;
pub mod secure_string;
pub mod traits;

// Re-export traits and shared types
pub use traits::{
    AssetsProvider,
    AwsProfileConfig,
    ConnectorError,
    ConnectorResult,
    ProfileConfig,
    SyncRequest,
    TaskQueue,
};

pub use http::{HttpClient, RegistryAuth, RegistryConfig};
pub use secure_string::SecureString;

// Re-export connector implementations
pub use cloud::{create_provider, AwsAssetsProvider, MockAssetsProvider};
pub use queue::{ListenConfig, MockTaskQueue, SqsTaskQueue};
pub use registry::{
    AdminUserRecord, AssetPayload, AssetRecord, Catalog, ConfirmOptions, DomainRecord,
    LabelRecord, MockRegistry, NodeRecord, RegistryApi, RegistryClient, SystemUserRecord,
    TaskMonitor, TaskOutcome,
};
