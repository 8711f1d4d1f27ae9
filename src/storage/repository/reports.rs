// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bug/debug report repository.
//!
//! Reports are write-once records: a kind, a summary, and a free-form JSON
//! detail blob (stack traces, environment dumps, reproduction steps).

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{Db, StoreResult, REPORTS};

/// Report kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Bug,
    Debug,
}

/// Report as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredReport {
    /// Unique report identifier (UUID)
    pub id: String,
    /// Bug or debug
    pub kind: ReportKind,
    /// Reporting user
    pub reporter_user_id: String,
    /// One-line summary
    pub summary: String,
    /// Free-form detail JSON
    #[serde(default)]
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Repository for bug/debug reports.
pub struct ReportRepository<'a> {
    db: &'a Db,
}

impl<'a> ReportRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Persist a new report.
    pub fn create(&self, report: &StoredReport) -> StoreResult<()> {
        let json = serde_json::to_vec(report)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut table = write_txn.open_table(REPORTS)?;
            table.insert(report.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a report by id.
    pub fn get(&self, report_id: &str) -> StoreResult<Option<StoredReport>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(REPORTS)?;
        match table.get(report_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all reports, optionally filtered by kind.
    pub fn list(&self, kind: Option<ReportKind>) -> StoreResult<Vec<StoredReport>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(REPORTS)?;
        let mut reports = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let report: StoredReport = serde_json::from_slice(entry.1.value())?;
            if kind.map(|k| k == report.kind).unwrap_or(true) {
                reports.push(report);
            }
        }
        Ok(reports)
    }
}
