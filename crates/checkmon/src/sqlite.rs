//! SQLite-backed alert state.

use crate::state::AlertState;
use common::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Durable alert state keyed by check name. Survives restarts, so a
/// condition alerted before a restart stays suppressed after it.
pub struct SqliteState {
    conn: Mutex<Option<Connection>>,
}

impl SqliteState {
    /// Open (or create) the ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::state(format!("open database: {e}")))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS alert_state (
                 check_name TEXT PRIMARY KEY,
                 condition_hash TEXT NOT NULL,
                 alerted_at INTEGER NOT NULL
             )",
            [],
        )
        .map_err(|e| Error::state(format!("create table: {e}")))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

impl AlertState for SqliteState {
    fn should_alert(&self, check_name: &str, condition_hash: &str) -> bool {
        let guard = self.conn.lock();
        let Some(conn) = guard.as_ref() else {
            // Ledger unavailable: err on the side of alerting.
            return true;
        };

        let stored: rusqlite::Result<Option<String>> = conn
            .query_row(
                "SELECT condition_hash FROM alert_state WHERE check_name = ?1",
                params![check_name],
                |row| row.get(0),
            )
            .optional();

        match stored {
            Ok(Some(stored)) => stored != condition_hash,
            Ok(None) => true,
            Err(e) => {
                warn!(check = check_name, error = %e, "alert state lookup failed");
                true
            }
        }
    }

    fn mark_alerted(&self, check_name: &str, condition_hash: &str) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::state("alert state is closed"))?;

        conn.execute(
            "INSERT INTO alert_state (check_name, condition_hash, alerted_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(check_name) DO UPDATE SET
                 condition_hash = excluded.condition_hash,
                 alerted_at = excluded.alerted_at",
            params![check_name, condition_hash, unix_now()],
        )
        .map_err(|e| Error::state(format!("upsert alert state: {e}")))?;

        Ok(())
    }

    fn clear(&self, check_name: &str) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::state("alert state is closed"))?;

        conn.execute(
            "DELETE FROM alert_state WHERE check_name = ?1",
            params![check_name],
        )
        .map_err(|e| Error::state(format!("delete alert state: {e}")))?;

        Ok(())
    }

    fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close()
            .map_err(|(_, e)| Error::state(format!("close database: {e}")))
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
