//! Periodic check scheduling with alert deduplication.
//!
//! This crate drives user-defined checks on independent cadences, backs
//! off failing checks exponentially, and delivers at most one
//! notification per distinct alert condition:
//!
//! - [`Scheduler`] owns the registered checks and one timing loop per
//!   check;
//! - [`Backoff`] doubles a failing check's wait up to 32x its base
//!   interval, capped at one hour;
//! - [`AlertState`] remembers the last alerted condition per check so
//!   an unchanged condition is never re-notified, with in-memory and
//!   SQLite-backed implementations;
//! - [`Notifier`] delivers materialized [`Alert`]s, with stdout, ntfy,
//!   Twilio and SendGrid transports plus a fan-out composite.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use checkmon::{Analyzer, Check, CheckResult, MemoryState, Scheduler, StdoutNotifier};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! struct PingCheck;
//!
//! #[async_trait]
//! impl Check for PingCheck {
//!     fn name(&self) -> &str {
//!         "ping"
//!     }
//!
//!     fn interval(&self) -> Duration {
//!         Duration::from_secs(60)
//!     }
//!
//!     async fn run(
//!         &self,
//!         _cancel: &CancellationToken,
//!         _analyzer: Option<&Analyzer>,
//!     ) -> checkmon::Result<CheckResult> {
//!         Ok(CheckResult::ok())
//!     }
//! }
//!
//! # async fn example() {
//! let mut scheduler = Scheduler::new(
//!     None,
//!     Arc::new(StdoutNotifier::new()),
//!     Arc::new(MemoryState::new()),
//! );
//! scheduler.register(Arc::new(PingCheck));
//!
//! let root = CancellationToken::new();
//! scheduler.start(&root);
//! // ... run until shutdown ...
//! scheduler.stop().await;
//! # }
//! ```

pub mod analyzer;
pub mod backoff;
pub mod notify;
mod runner;
pub mod scheduler;
pub mod sqlite;
pub mod state;
pub mod types;

pub use analyzer::Analyzer;
pub use backoff::{Backoff, MAX_BACKOFF_DELAY, MAX_BACKOFF_MULTIPLIER};
pub use common::{Error, Result};
pub use notify::{
    MultiNotifier, Notifier, NtfyNotifier, SendGridNotifier, StdoutNotifier, TwilioNotifier,
};
pub use scheduler::Scheduler;
pub use sqlite::SqliteState;
pub use state::{AlertState, MemoryState, condition_hash};
pub use types::{Alert, Check, CheckResult, Priority};
