//! Revocation Ledger
//! Mission: Persist explicitly invalidated tokens until they expire naturally

use crate::auth::models::TokenPurpose;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::time::Duration;
use tracing::debug;

/// Persisted set of explicitly invalidated tokens, independent of the
/// credential store.
///
/// A token failing the codec's own expiry check is rejected regardless, so an
/// entry only needs to cover the token's remaining natural lifetime; expired
/// entries are dead weight and get purged.
pub struct RevocationLedger {
    db_path: String,
}

impl RevocationLedger {
    /// Create a new ledger and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        let ledger = Self {
            db_path: db_path.to_string(),
        };
        ledger.init_db()?;
        Ok(ledger)
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        // Concurrent writers serialize on the file lock instead of erroring.
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.open()?;

        // The PRIMARY KEY on token is the atomicity primitive: one row per
        // token string, enforced by the storage layer.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS revoked_tokens (
                token TEXT PRIMARY KEY,
                purpose TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Record a token as revoked until `expires_at` (unix seconds).
    ///
    /// Returns true when this call inserted the entry, false when the token
    /// was already present. A single `INSERT OR IGNORE` against the primary
    /// key - never a read followed by a write - so two racing calls get
    /// exactly one winner. Refresh rotation uses that return value as its
    /// single-use gate; logout ignores it.
    pub fn record(&self, token: &str, purpose: TokenPurpose, expires_at: i64) -> Result<bool> {
        let conn = self.open()?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO revoked_tokens (token, purpose, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![token, purpose.as_str(), expires_at],
            )
            .context("Failed to record revocation")?;

        debug!(
            purpose = purpose.as_str(),
            inserted = inserted == 1,
            "Revocation recorded"
        );

        Ok(inserted == 1)
    }

    /// Check ledger membership. Entries past their natural expiry are
    /// ignored, so correctness never depends on purge timing.
    pub fn is_revoked(&self, token: &str) -> Result<bool> {
        let conn = self.open()?;

        let revoked: bool = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM revoked_tokens WHERE token = ?1 AND expires_at > ?2
                 )",
                params![token, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .context("Failed to check revocation")?;

        Ok(revoked)
    }

    /// Delete entries whose tokens have expired naturally. Returns the number
    /// of rows removed. Called from a background task.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.open()?;

        let removed = conn
            .execute(
                "DELETE FROM revoked_tokens WHERE expires_at <= ?1",
                params![Utc::now().timestamp()],
            )
            .context("Failed to purge expired revocations")?;

        Ok(removed)
    }
}
