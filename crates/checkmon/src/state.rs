//! Alert state ledger for notification deduplication.

use common::Result;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::SystemTime;

/// Tracks the last alerted condition per check so that an unchanged
/// condition is notified at most once.
///
/// Shared by every check loop; implementations must be safe for
/// concurrent use and must not block for long.
pub trait AlertState: Send + Sync {
    /// Returns true if this is a new alert condition for the check:
    /// either no record exists, or the stored hash differs.
    fn should_alert(&self, check_name: &str, condition_hash: &str) -> bool;

    /// Records that an alert was sent. Last-writer-wins; no history.
    fn mark_alerted(&self, check_name: &str, condition_hash: &str) -> Result<()>;

    /// Resets state for a check once its condition clears, so the next
    /// occurrence of the same condition alerts again.
    fn clear(&self, check_name: &str) -> Result<()>;

    /// Releases backing resources. Idempotent.
    fn close(&self) -> Result<()>;
}

/// Digest of an alert's identity, computed over title and message only.
///
/// Priority, tags and metadata are deliberately excluded: two results
/// with the same title and message are the same condition.
pub fn condition_hash(title: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(message.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// One ledger entry: the last alerted condition for a check.
#[derive(Debug, Clone)]
struct AlertRecord {
    condition_hash: String,
    alerted_at: SystemTime,
}

/// In-memory alert state. Records are lost on restart.
#[derive(Default)]
pub struct MemoryState {
    alerts: RwLock<HashMap<String, AlertRecord>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time the check last alerted, if a record exists.
    pub fn last_alerted_at(&self, check_name: &str) -> Option<SystemTime> {
        self.alerts
            .read()
            .get(check_name)
            .map(|record| record.alerted_at)
    }
}

impl AlertState for MemoryState {
    fn should_alert(&self, check_name: &str, condition_hash: &str) -> bool {
        match self.alerts.read().get(check_name) {
            Some(record) => record.condition_hash != condition_hash,
            None => true,
        }
    }

    fn mark_alerted(&self, check_name: &str, condition_hash: &str) -> Result<()> {
        self.alerts.write().insert(
            check_name.to_string(),
            AlertRecord {
                condition_hash: condition_hash.to_string(),
                alerted_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn clear(&self, check_name: &str) -> Result<()> {
        self.alerts.write().remove(check_name);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_short() {
        let a = condition_hash("Site Down", "example.com is not responding");
        let b = condition_hash("Site Down", "example.com is not responding");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_changes_with_title_or_message() {
        let base = condition_hash("Site Down", "example.com is not responding");
        assert_ne!(base, condition_hash("Site Up", "example.com is not responding"));
        assert_ne!(base, condition_hash("Site Down", "example.org is not responding"));
    }

    #[test]
    fn test_memory_should_alert_new_check() {
        let state = MemoryState::new();
        assert!(state.should_alert("site-up", "abcd"));
    }

    #[test]
    fn test_memory_suppresses_same_hash() {
        let state = MemoryState::new();
        state.mark_alerted("site-up", "abcd").unwrap();
        assert!(!state.should_alert("site-up", "abcd"));
        assert!(state.should_alert("site-up", "ef01"));
        assert!(state.should_alert("other-check", "abcd"));
    }

    #[test]
    fn test_memory_clear_allows_realert() {
        let state = MemoryState::new();
        state.mark_alerted("site-up", "abcd").unwrap();
        assert!(state.last_alerted_at("site-up").is_some());

        state.clear("site-up").unwrap();
        assert!(state.last_alerted_at("site-up").is_none());
        assert!(state.should_alert("site-up", "abcd"));
    }

    #[test]
    fn test_memory_mark_overwrites() {
        let state = MemoryState::new();
        state.mark_alerted("site-up", "abcd").unwrap();
        state.mark_alerted("site-up", "ef01").unwrap();
        assert!(!state.should_alert("site-up", "ef01"));
        assert!(state.should_alert("site-up", "abcd"));
    }

    #[test]
    fn test_memory_close_is_idempotent() {
        let state = MemoryState::new();
        state.close().unwrap();
        state.close().unwrap();
    }
}
