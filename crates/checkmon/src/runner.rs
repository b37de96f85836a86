//! Per-invocation check execution and alert dispatch.

use crate::analyzer::Analyzer;
use crate::backoff::Backoff;
use crate::notify::Notifier;
use crate::state::{AlertState, condition_hash};
use crate::types::{Alert, Check};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collaborators shared by every check loop. AlertState and Notifier
/// are internally thread-safe; everything else is cheap to clone.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub analyzer: Option<Arc<Analyzer>>,
    pub notifier: Arc<dyn Notifier>,
    pub state: Arc<dyn AlertState>,
    pub cancel: CancellationToken,
}

/// Execute one check invocation and translate the outcome into a
/// dedup/notify decision. Returns the backoff state for the next wait.
pub(crate) async fn execute_check(
    check: &dyn Check,
    ctx: &RunContext,
    backoff: Backoff,
) -> Backoff {
    debug!(check = check.name(), "running check");

    let result = match check.run(&ctx.cancel, ctx.analyzer.as_deref()).await {
        Ok(result) => result,
        Err(e) => {
            let next = backoff.failure();
            warn!(
                check = check.name(),
                error = %e,
                multiplier = next.multiplier(),
                "check failed"
            );
            return next;
        }
    };
    let next = backoff.success();

    if !result.should_alert {
        debug!(check = check.name(), "no alert needed");
        // Condition has resolved; the next occurrence should alert again.
        if let Err(e) = ctx.state.clear(check.name()) {
            warn!(check = check.name(), error = %e, "failed to clear alert state");
        }
        return next;
    }

    let hash = condition_hash(&result.title, &result.message);
    if !ctx.state.should_alert(check.name(), &hash) {
        info!(check = check.name(), "duplicate alert suppressed");
        return next;
    }

    let alert = Alert::from_result(check.name(), result);
    let title = alert.title.clone();
    if let Err(e) = ctx.notifier.send(&alert).await {
        // Leave the ledger untouched so the alert is retried on the
        // next occurrence of this condition.
        warn!(check = check.name(), error = %e, "notification failed");
        return next;
    }

    if let Err(e) = ctx.state.mark_alerted(check.name(), &hash) {
        warn!(check = check.name(), error = %e, "failed to mark alerted");
    }
    info!(check = check.name(), title = %title, "alert sent");
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryState;
    use crate::types::{CheckResult, Priority};
    use async_trait::async_trait;
    use common::{Error, Result};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct StaticCheck {
        name: &'static str,
        result: Mutex<CheckResult>,
        fail: AtomicBool,
    }

    impl StaticCheck {
        fn alerting(name: &'static str, title: &str, message: &str) -> Self {
            Self {
                name,
                result: Mutex::new(CheckResult::alert(title, message)),
                fail: AtomicBool::new(false),
            }
        }

        fn quiet(name: &'static str) -> Self {
            Self {
                name,
                result: Mutex::new(CheckResult::ok()),
                fail: AtomicBool::new(false),
            }
        }

        fn failing(name: &'static str) -> Self {
            let check = Self::quiet(name);
            check.fail.store(true, Ordering::SeqCst);
            check
        }

        fn set_result(&self, result: CheckResult) {
            *self.result.lock() = result;
        }
    }

    #[async_trait]
    impl Check for StaticCheck {
        fn name(&self) -> &str {
            self.name
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(60)
        }

        async fn run(
            &self,
            _cancel: &CancellationToken,
            _analyzer: Option<&Analyzer>,
        ) -> Result<CheckResult> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::check("probe failed"));
            }
            Ok(self.result.lock().clone())
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<Alert>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }

        fn sent_titles(&self) -> Vec<String> {
            self.sent.lock().iter().map(|a| a.title.clone()).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, alert: &Alert) -> Result<()> {
            self.sent.lock().push(alert.clone());
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::notify("simulated delivery failure"))
            } else {
                Ok(())
            }
        }
    }

    fn context(
        notifier: Arc<RecordingNotifier>,
        state: Arc<MemoryState>,
    ) -> RunContext {
        RunContext {
            analyzer: None,
            notifier,
            state,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_new_alert_is_delivered_and_marked() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;

        assert_eq!(backoff, Backoff::default());
        assert_eq!(notifier.sent_titles(), vec!["Site Down"]);
        let hash = condition_hash("Site Down", "X is not responding");
        assert!(!state.should_alert("site-up", &hash));
    }

    #[tokio::test]
    async fn test_duplicate_alert_is_suppressed() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;
        execute_check(&check, &ctx, backoff).await;

        assert_eq!(notifier.sent_titles(), vec!["Site Down"]);
    }

    #[tokio::test]
    async fn test_dedup_ignores_tags_and_metadata() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;

        // Same title and message, different everything else: still the
        // same condition.
        check.set_result(
            CheckResult::alert("Site Down", "X is not responding")
                .with_priority(Priority::Urgent)
                .with_tags(["different", "tags"])
                .with_metadata("attempt", "2"),
        );
        execute_check(&check, &ctx, backoff).await;

        assert_eq!(notifier.sent_titles(), vec!["Site Down"]);
    }

    #[tokio::test]
    async fn test_changed_condition_alerts_again() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;

        check.set_result(CheckResult::alert("Site Error", "X returned status 503"));
        execute_check(&check, &ctx, backoff).await;

        assert_eq!(notifier.sent_titles(), vec!["Site Down", "Site Error"]);
    }

    #[tokio::test]
    async fn test_resolved_condition_clears_state_and_realerts() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        // First occurrence delivers and marks.
        let backoff = execute_check(&check, &ctx, Backoff::default()).await;
        // Identical occurrence is suppressed.
        let backoff = execute_check(&check, &ctx, backoff).await;

        // Condition resolves: record is cleared.
        check.set_result(CheckResult::ok());
        let backoff = execute_check(&check, &ctx, backoff).await;
        assert!(state.last_alerted_at("site-up").is_none());

        // Same condition after clearing alerts again.
        check.set_result(CheckResult::alert("Site Down", "X is not responding"));
        execute_check(&check, &ctx, backoff).await;

        assert_eq!(notifier.sent_titles(), vec!["Site Down", "Site Down"]);
    }

    #[tokio::test]
    async fn test_failed_delivery_leaves_state_unmarked() {
        let notifier = RecordingNotifier::new();
        notifier.fail.store(true, Ordering::SeqCst);
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::alerting("site-up", "Site Down", "X is not responding");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;

        let hash = condition_hash("Site Down", "X is not responding");
        assert!(state.should_alert("site-up", &hash));

        // Delivery recovers: the same condition is sent again.
        notifier.fail.store(false, Ordering::SeqCst);
        execute_check(&check, &ctx, backoff).await;

        assert_eq!(notifier.sent_titles(), vec!["Site Down", "Site Down"]);
        assert!(!state.should_alert("site-up", &hash));
    }

    #[tokio::test]
    async fn test_execution_error_backs_off_and_touches_nothing() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        state.mark_alerted("site-up", "abcd").unwrap();
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::failing("site-up");

        let backoff = execute_check(&check, &ctx, Backoff::default()).await;
        assert_eq!(backoff.consecutive_failures(), 1);
        assert_eq!(backoff.multiplier(), 2);

        let backoff = execute_check(&check, &ctx, backoff).await;
        assert_eq!(backoff.consecutive_failures(), 2);
        assert_eq!(backoff.multiplier(), 4);

        // No notifications, and the existing record is intact.
        assert!(notifier.sent_titles().is_empty());
        assert!(!state.should_alert("site-up", "abcd"));
    }

    #[tokio::test]
    async fn test_success_resets_backoff() {
        let notifier = RecordingNotifier::new();
        let state = Arc::new(MemoryState::new());
        let ctx = context(notifier.clone(), state.clone());
        let check = StaticCheck::quiet("site-up");

        let mut backoff = Backoff::default();
        for _ in 0..4 {
            backoff = backoff.failure();
        }
        assert_eq!(backoff.multiplier(), 16);

        let backoff = execute_check(&check, &ctx, backoff).await;
        assert_eq!(backoff, Backoff::default());
    }
}
