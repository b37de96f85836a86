//! Check scheduling and lifecycle management.

use crate::analyzer::Analyzer;
use crate::backoff::Backoff;
use crate::notify::Notifier;
use crate::runner::{RunContext, execute_check};
use crate::state::AlertState;
use crate::types::Check;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Runs registered checks, each on its own cadence.
///
/// Every check gets an independent timing loop; the loops share the
/// analyzer, notifier and alert state, and a single cancellation signal
/// owned by the scheduler.
pub struct Scheduler {
    checks: Vec<Arc<dyn Check>>,
    analyzer: Option<Arc<Analyzer>>,
    notifier: Arc<dyn Notifier>,
    state: Arc<dyn AlertState>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a new scheduler with the shared collaborators.
    pub fn new(
        analyzer: Option<Arc<Analyzer>>,
        notifier: Arc<dyn Notifier>,
        state: Arc<dyn AlertState>,
    ) -> Self {
        Self {
            checks: Vec::new(),
            analyzer,
            notifier,
            state,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a check. Must be called before [`start`](Self::start).
    pub fn register(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    /// Launch one timing loop per registered check.
    ///
    /// All loops run under a cancellation token derived from `parent`,
    /// so cancelling the parent stops the scheduler too.
    pub fn start(&mut self, parent: &CancellationToken) {
        self.cancel = parent.child_token();
        info!(checks = self.checks.len(), "starting check loops");

        for check in &self.checks {
            let ctx = RunContext {
                analyzer: self.analyzer.clone(),
                notifier: self.notifier.clone(),
                state: self.state.clone(),
                cancel: self.cancel.clone(),
            };
            self.tracker.spawn(run_loop(check.clone(), ctx));
        }
        self.tracker.close();
    }

    /// Cancel every loop and wait until each has exited.
    ///
    /// In-flight check executions are drained, not aborted; a check
    /// that ignores its cancellation token delays shutdown.
    pub async fn stop(&self) {
        info!("stopping check loops");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("all check loops stopped");
    }
}

/// Timing loop for a single check.
///
/// Backoff state is private to this loop; executions are strictly
/// sequential because the next wait starts only after the previous
/// invocation returns.
async fn run_loop(check: Arc<dyn Check>, ctx: RunContext) {
    // First execution happens immediately, before any interval wait.
    let mut backoff = execute_check(check.as_ref(), &ctx, Backoff::default()).await;

    loop {
        let delay = backoff.delay(check.interval());

        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                debug!(check = check.name(), "check loop stopping");
                return;
            }
            _ = sleep(delay) => {
                backoff = execute_check(check.as_ref(), &ctx, backoff).await;
            }
        }
    }
}
