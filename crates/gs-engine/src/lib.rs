//! # gs-engine
//!
//! The reconciliation engine: the linking agent that resolves assets against
//! the registry's relational resources, and the workflows that drive whole
//! runs (targeted sync, profile diff, clean, queue-driven listen).

pub mod agent;
pub mod workflows;

pub use agent::{AssetAgent, SyncDisposition, SyncedAsset};
pub use workflows::{
    CleanAssets, CleanOptions, ListenLoop, RunSummary, SmartSync, SyncOptions, TargetedSync,
    WorkflowError, WorkflowResult,
};
