// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `user_handles` / `user_emails`: uniqueness maps → user_id
//! - `tokens`: jti → serialized StoredToken
//! - `user_tokens`: composite key (user_id|jti) → jti
//! - `groups` / `group_names` / `group_members`
//! - `tickets` + append-only child tables keyed (ticket_id|seq_be)
//! - `agents` / `agent_configs`
//! - `agent_metrics`: composite key (uuid|!timestamp_be|metric_id) → record
//! - `alerts` / `agent_alerts`
//! - `reports`: report_id → serialized StoredReport

use std::path::Path;

use redb::{Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
pub(crate) const USER_HANDLES: TableDefinition<&str, &str> = TableDefinition::new("user_handles");
pub(crate) const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

pub(crate) const TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("tokens");
/// Index: composite key (user_id|jti) → jti, for per-user token walks.
pub(crate) const USER_TOKENS: TableDefinition<&[u8], &str> = TableDefinition::new("user_tokens");

pub(crate) const GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("groups");
pub(crate) const GROUP_NAMES: TableDefinition<&str, &str> = TableDefinition::new("group_names");
/// Membership: composite key (group_id|user_id) → user_id.
pub(crate) const GROUP_MEMBERS: TableDefinition<&[u8], &str> = TableDefinition::new("group_members");

pub(crate) const TICKETS: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");
/// Append-only child records: composite key (ticket_id|seq_be) → record.
pub(crate) const TICKET_COMMENTS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("ticket_comments");
pub(crate) const TICKET_HISTORY: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("ticket_history");
pub(crate) const TICKET_ESCALATIONS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("ticket_escalations");

pub(crate) const AGENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("agents");
pub(crate) const AGENT_CONFIGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("agent_configs");
/// Metric rows: composite key (uuid|!timestamp_be|metric_id) for
/// newest-first range scans.
pub(crate) const AGENT_METRICS: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("agent_metrics");

pub(crate) const ALERTS: TableDefinition<&str, &[u8]> = TableDefinition::new("alerts");
/// Index: composite key (uuid|alert_id) → alert_id.
pub(crate) const AGENT_ALERTS: TableDefinition<&[u8], &str> = TableDefinition::new("agent_alerts");

pub(crate) const REPORTS: TableDefinition<&str, &[u8]> = TableDefinition::new("reports");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key `prefix|suffix` for secondary-index tables.
pub(crate) fn composite_key(prefix: &str, suffix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(b'|');
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Build a composite key `prefix|seq_be` for append-only child tables.
/// Big-endian sequence numbers keep insertion order under byte comparison.
pub(crate) fn seq_key(prefix: &str, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + 8);
    key.extend_from_slice(prefix.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Build a composite key `prefix|!timestamp_be|id`.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(crate) fn time_key(prefix: &str, timestamp: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Build a prefix for range scanning all composite keys under `prefix`.
pub(crate) fn prefix_start(prefix: &str) -> Vec<u8> {
    let mut start = Vec::with_capacity(prefix.len() + 1);
    start.extend_from_slice(prefix.as_bytes());
    start.push(b'|');
    start
}

/// Build the upper bound for a prefix range scan.
pub(crate) fn prefix_end(prefix: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(prefix.len() + 1 + 48);
    end.extend_from_slice(prefix.as_bytes());
    end.push(b'|');
    // Past any valid key with this prefix
    end.extend_from_slice(&[0xFF; 48]);
    end
}

// =============================================================================
// Db
// =============================================================================

/// Embedded ACID database shared by all repositories.
pub struct Db {
    pub(crate) inner: Database,
}

impl Db {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let inner = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = inner.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_HANDLES)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(TOKENS)?;
            let _ = write_txn.open_table(USER_TOKENS)?;
            let _ = write_txn.open_table(GROUPS)?;
            let _ = write_txn.open_table(GROUP_NAMES)?;
            let _ = write_txn.open_table(GROUP_MEMBERS)?;
            let _ = write_txn.open_table(TICKETS)?;
            let _ = write_txn.open_table(TICKET_COMMENTS)?;
            let _ = write_txn.open_table(TICKET_HISTORY)?;
            let _ = write_txn.open_table(TICKET_ESCALATIONS)?;
            let _ = write_txn.open_table(AGENTS)?;
            let _ = write_txn.open_table(AGENT_CONFIGS)?;
            let _ = write_txn.open_table(AGENT_METRICS)?;
            let _ = write_txn.open_table(ALERTS)?;
            let _ = write_txn.open_table(AGENT_ALERTS)?;
            let _ = write_txn.open_table(REPORTS)?;
        }
        write_txn.commit()?;

        Ok(Self { inner })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use redb::ReadableDatabase;

    #[test]
    fn open_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();

        // A read transaction must be able to open every pre-created table.
        let read_txn = db.inner.begin_read().unwrap();
        assert!(read_txn.open_table(USERS).is_ok());
        assert!(read_txn.open_table(TOKENS).is_ok());
        assert!(read_txn.open_table(AGENT_METRICS).is_ok());
        assert!(read_txn.open_table(REPORTS).is_ok());
    }

    #[test]
    fn time_key_ordering() {
        // Newer timestamps should produce smaller composite keys (descending)
        let key_old = time_key("agent-1", 1000, "m1");
        let key_new = time_key("agent-1", 2000, "m2");
        assert!(key_new < key_old, "Newer timestamps should sort first");
    }

    #[test]
    fn seq_key_ordering() {
        let first = seq_key("ticket-1", 1);
        let second = seq_key("ticket-1", 2);
        assert!(first < second, "Sequence keys should sort in insertion order");
    }

    #[test]
    fn prefix_bounds_cover_composite_keys() {
        let key = composite_key("user-1", "jti-abc");
        assert!(prefix_start("user-1").as_slice() <= key.as_slice());
        assert!(key.as_slice() < prefix_end("user-1").as_slice());

        // A different prefix must fall outside the range
        let other = composite_key("user-2", "jti-abc");
        assert!(other.as_slice() >= prefix_end("user-1").as_slice());
    }
}
