// SPDX-License-Identifier: AGPL-3.0-or-later

//! Alert repository.
//!
//! Alerts are created unconditionally on each agent request; the
//! `notification_interval_secs` field is persisted for operators but no
//! throttling scheduler consumes it.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    composite_key, prefix_end, prefix_start, Db, StoreError, StoreResult, AGENT_ALERTS, ALERTS,
};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Ok,
}

/// Alert lifecycle status.
///
/// `active` is the sole initial state; `acknowledged`, `resolved`, and
/// `escalated` are reachable from it. `resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Escalated,
}

impl AlertStatus {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        match (self, next) {
            (AlertStatus::Active, AlertStatus::Acknowledged)
            | (AlertStatus::Active, AlertStatus::Resolved)
            | (AlertStatus::Active, AlertStatus::Escalated)
            | (AlertStatus::Acknowledged, AlertStatus::Resolved)
            | (AlertStatus::Acknowledged, AlertStatus::Escalated)
            | (AlertStatus::Escalated, AlertStatus::Resolved) => true,
            _ => false,
        }
    }
}

/// Alert as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredAlert {
    /// Unique alert identifier (UUID)
    pub id: String,
    /// Originating agent UUID
    pub agent_uuid: String,
    /// Optional service the alert refers to
    pub service: Option<String>,
    /// Severity at creation
    pub severity: AlertSeverity,
    /// Lifecycle status
    pub status: AlertStatus,
    /// Human-readable message
    pub message: String,
    /// Free-form metadata JSON
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Last notification timestamp (stored, not enforced)
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Desired re-notification interval (stored, not enforced)
    pub notification_interval_secs: Option<u64>,
    /// When the alert was raised
    pub created_at: DateTime<Utc>,
    /// Last status mutation
    pub updated_at: DateTime<Utc>,
}

/// Repository for alert rows and the per-agent alert index.
pub struct AlertRepository<'a> {
    db: &'a Db,
}

impl<'a> AlertRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a new alert and its agent-index entry.
    pub fn create(&self, alert: &StoredAlert) -> StoreResult<()> {
        let json = serde_json::to_vec(alert)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut alerts = write_txn.open_table(ALERTS)?;
            alerts.insert(alert.id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(AGENT_ALERTS)?;
            let key = composite_key(&alert.agent_uuid, &alert.id);
            index.insert(key.as_slice(), alert.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up an alert by id.
    pub fn get(&self, alert_id: &str) -> StoreResult<Option<StoredAlert>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(ALERTS)?;
        match table.get(alert_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Move an alert through its lifecycle, rejecting illegal transitions.
    pub fn update_status(&self, alert_id: &str, next: AlertStatus) -> StoreResult<StoredAlert> {
        let write_txn = self.db.inner.begin_write()?;
        let alert = {
            let mut alerts = write_txn.open_table(ALERTS)?;
            let existing_bytes = {
                let existing = alerts
                    .get(alert_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("alert {alert_id}")))?;
                existing.value().to_vec()
            };

            let mut alert: StoredAlert = serde_json::from_slice(&existing_bytes)?;
            if !alert.status.can_transition_to(next) {
                return Err(StoreError::Conflict(format!(
                    "alert {alert_id}: cannot move from {:?} to {:?}",
                    alert.status, next
                )));
            }
            alert.status = next;
            alert.updated_at = Utc::now();

            let json = serde_json::to_vec(&alert)?;
            alerts.insert(alert_id, json.as_slice())?;
            alert
        };
        write_txn.commit()?;
        Ok(alert)
    }

    /// List all alerts raised by an agent.
    pub fn list_by_agent(&self, agent_uuid: &str) -> StoreResult<Vec<StoredAlert>> {
        let ids = {
            let read_txn = self.db.inner.begin_read()?;
            let index = read_txn.open_table(AGENT_ALERTS)?;
            let start = prefix_start(agent_uuid);
            let end = prefix_end(agent_uuid);
            let mut ids = Vec::new();
            for entry in index.range(start.as_slice()..end.as_slice())? {
                let entry = entry?;
                ids.push(entry.1.value().to_string());
            }
            ids
        };

        let read_txn = self.db.inner.begin_read()?;
        let alerts = read_txn.open_table(ALERTS)?;
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(value) = alerts.get(id.as_str())? {
                result.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_db() -> (Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_alert(id: &str, agent: &str) -> StoredAlert {
        let now = Utc::now();
        StoredAlert {
            id: id.to_string(),
            agent_uuid: agent.to_string(),
            service: Some("nginx".to_string()),
            severity: AlertSeverity::Warning,
            status: AlertStatus::Active,
            message: "disk usage above threshold".to_string(),
            metadata: json!({"disk": "/var", "usage": 91.2}),
            tags: vec!["disk".to_string()],
            last_notified_at: None,
            notification_interval_secs: Some(3600),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_list_by_agent() {
        let (db, _dir) = temp_db();
        let repo = AlertRepository::new(&db);
        repo.create(&sample_alert("al-1", "agent-1")).unwrap();
        repo.create(&sample_alert("al-2", "agent-1")).unwrap();
        repo.create(&sample_alert("al-3", "agent-2")).unwrap();

        assert_eq!(repo.list_by_agent("agent-1").unwrap().len(), 2);
        assert_eq!(repo.list_by_agent("agent-2").unwrap().len(), 1);
        assert!(repo.list_by_agent("agent-3").unwrap().is_empty());
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        let (db, _dir) = temp_db();
        let repo = AlertRepository::new(&db);
        repo.create(&sample_alert("al-1", "agent-1")).unwrap();

        let acked = repo
            .update_status("al-1", AlertStatus::Acknowledged)
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);

        let resolved = repo.update_status("al-1", AlertStatus::Resolved).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);

        // Resolved is terminal
        let reopen = repo.update_status("al-1", AlertStatus::Active);
        assert!(matches!(reopen, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn escalated_alert_can_still_resolve() {
        let (db, _dir) = temp_db();
        let repo = AlertRepository::new(&db);
        repo.create(&sample_alert("al-1", "agent-1")).unwrap();

        repo.update_status("al-1", AlertStatus::Escalated).unwrap();
        let resolved = repo.update_status("al-1", AlertStatus::Resolved).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
    }

    #[test]
    fn unknown_alert_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = AlertRepository::new(&db);
        let result = repo.update_status("ghost", AlertStatus::Resolved);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
