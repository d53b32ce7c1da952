//! # gs-observability
//!
//! Logging infrastructure for gatesync, built on the tracing ecosystem.
//!
//! The binary initializes logging exactly once; library crates only emit
//! through `tracing` macros and spans.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
