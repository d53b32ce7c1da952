//! # gs-core
//!
//! Core domain types for gatesync: the normalized tag/label model, the
//! instance asset record with its provenance comment codec, and the
//! declarative selector engine that decides which provider instances are
//! registered and how their attributes are enriched.
//!
//! Everything in this crate is plain data and pure evaluation, with no I/O.
//! Providers and the registry client live in `gs-connectors`; the linking
//! agent and reconciliation workflows live in `gs-engine`.

pub mod asset;
pub mod selector;
pub mod tag;

// Re-export the types nearly every consumer needs.
pub use asset::InstanceAsset;
pub use selector::{SelectorConfig, SelectorError, TagSelector};
pub use tag::{CompiledTag, Tag, TagError};
