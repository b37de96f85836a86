//! Checkmon daemon - periodic checks with deduplicated alerting.
//!
//! The daemon wires together the building blocks from the `checkmon`
//! crate:
//!
//! - **Config**: YAML configuration selecting notification transports,
//!   the alert-state backend, and the analysis CLI
//! - **Checks**: the user-edited roster of probes to run
//!
//! The scheduler, backoff, dedup ledger and notification transports
//! themselves live in the `checkmon` library crate.

pub mod checks;
pub mod config;

pub use config::{Config, ConfigError};
