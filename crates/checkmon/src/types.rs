//! Core check and alert types.

use crate::analyzer::Analyzer;
use async_trait::async_trait;
use common::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Urgency level of an alert.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Outcome of one check execution.
///
/// Produced fresh on every execution and never mutated after return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether this outcome warrants an alert.
    pub should_alert: bool,

    /// Short human-readable alert title.
    pub title: String,

    /// Longer human-readable alert message.
    pub message: String,

    /// Urgency of the alert.
    pub priority: Priority,

    /// Free-form tags forwarded to notification transports.
    pub tags: Vec<String>,

    /// Arbitrary key/value context forwarded to notification transports.
    pub metadata: HashMap<String, String>,
}

impl CheckResult {
    /// Create a result that needs no alert.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Create an alerting result with the given title and message.
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            should_alert: true,
            title: title.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Set the alert priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the alert tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach one metadata key/value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A named, independently scheduled probe.
///
/// Checks are registered with the [`Scheduler`](crate::Scheduler) as
/// `Arc<dyn Check>` and owned by it for its lifetime.
#[async_trait]
pub trait Check: Send + Sync {
    /// Unique identifier, used for scheduling, dedup state and logs.
    fn name(&self) -> &str;

    /// Base interval between executions. Must be positive.
    fn interval(&self) -> Duration;

    /// Execute the probe once.
    ///
    /// `analyzer` may be absent; checks that do not need it must
    /// tolerate `None`. Implementations must return promptly with an
    /// error once `cancel` fires rather than block indefinitely.
    async fn run(
        &self,
        cancel: &CancellationToken,
        analyzer: Option<&Analyzer>,
    ) -> Result<CheckResult>;
}

/// A notification ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub check_name: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub timestamp: SystemTime,
}

impl Alert {
    /// Materialize an alert from a check result.
    pub fn from_result(check_name: impl Into<String>, result: CheckResult) -> Self {
        Self {
            check_name: check_name.into(),
            title: result.title,
            message: result.message,
            priority: result.priority,
            tags: result.tags,
            metadata: result.metadata,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::Low.to_string(), "low");
        assert_eq!(Priority::Normal.to_string(), "normal");
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::Urgent.to_string(), "urgent");
    }

    #[test]
    fn test_priority_default_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok();
        assert!(!result.should_alert);
        assert!(result.title.is_empty());
    }

    #[test]
    fn test_check_result_alert_builders() {
        let result = CheckResult::alert("Site Down", "example.com is not responding")
            .with_priority(Priority::High)
            .with_tags(["web", "urgent"])
            .with_metadata("status", "503");

        assert!(result.should_alert);
        assert_eq!(result.title, "Site Down");
        assert_eq!(result.priority, Priority::High);
        assert_eq!(result.tags, vec!["web", "urgent"]);
        assert_eq!(result.metadata["status"], "503");
    }

    #[test]
    fn test_alert_from_result_copies_fields() {
        let result = CheckResult::alert("BTC Alert", "price above threshold")
            .with_priority(Priority::Urgent)
            .with_metadata("price", "101000.00");
        let alert = Alert::from_result("btc-price", result);

        assert_eq!(alert.check_name, "btc-price");
        assert_eq!(alert.title, "BTC Alert");
        assert_eq!(alert.message, "price above threshold");
        assert_eq!(alert.priority, Priority::Urgent);
        assert_eq!(alert.metadata["price"], "101000.00");
    }
}
