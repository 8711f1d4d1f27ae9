// SPDX-License-Identifier: AGPL-3.0-or-later

//! Monitoring agent repository.
//!
//! Agents authenticate with a UUID plus a shared-secret bearer token. Every
//! metric submission stores one JSON document per row under a composite key
//! `(uuid|!timestamp_be|metric_id)` so range scans return newest-first. No
//! schema is imposed on the metrics payload beyond "valid JSON".

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    prefix_end, prefix_start, time_key, Db, StoreError, StoreResult, AGENTS, AGENT_CONFIGS,
    AGENT_METRICS,
};

/// Agent lifecycle status, driven by check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Inactive,
    Error,
}

/// Monitoring agent as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredAgent {
    /// Unique agent UUID (also the wire identifier)
    pub uuid: String,
    /// Shared-secret bearer token (minted at registration)
    pub token: String,
    /// Owning user, if any
    pub owner_user_id: Option<String>,
    /// Current status
    pub status: AgentStatus,
    /// Last check-in timestamp
    pub last_checkin_at: Option<DateTime<Utc>>,
    /// Free-form agent version string
    pub version: Option<String>,
    /// Last reported IP
    pub ip: Option<String>,
    /// When the agent was registered
    pub created_at: DateTime<Utc>,
}

/// Per-agent configuration: thresholds, collector toggles, notification
/// targets. Exactly one row per agent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AgentConfig {
    /// Alerting thresholds keyed by metric name (e.g. "cpu" → 90.0)
    #[serde(default)]
    pub thresholds: serde_json::Value,
    /// Collector enable/disable toggles keyed by collector name
    #[serde(default)]
    pub collectors: serde_json::Value,
    /// Notification targets (emails, webhook URLs)
    #[serde(default)]
    pub notification_targets: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            thresholds: serde_json::Value::Object(Default::default()),
            collectors: serde_json::Value::Object(Default::default()),
            notification_targets: Vec::new(),
        }
    }
}

/// A single metric submission: one JSON blob, one timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MetricRecord {
    /// Row identifier (UUID)
    pub id: String,
    /// Denormalized agent UUID
    pub agent_uuid: String,
    /// The collected values, stored exactly as submitted
    pub metrics: serde_json::Value,
    /// Shared timestamp for all values in this submission
    pub recorded_at: DateTime<Utc>,
}

/// Repository for agents, their configuration, and metric rows.
pub struct AgentRepository<'a> {
    db: &'a Db,
}

impl<'a> AgentRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Register a new agent.
    pub fn create(&self, agent: &StoredAgent) -> StoreResult<()> {
        let json = serde_json::to_vec(agent)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut agents = write_txn.open_table(AGENTS)?;
            if agents.get(agent.uuid.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("agent {}", agent.uuid)));
            }
            agents.insert(agent.uuid.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up an agent by UUID.
    pub fn get(&self, uuid: &str) -> StoreResult<Option<StoredAgent>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(AGENTS)?;
        match table.get(uuid)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Authenticate an agent by UUID + shared-secret token.
    ///
    /// Returns `None` on unknown UUID or mismatched secret; callers map
    /// both cases to the same 401 so the secret cannot be probed.
    pub fn authenticate(&self, uuid: &str, token: &str) -> StoreResult<Option<StoredAgent>> {
        match self.get(uuid)? {
            Some(agent) if agent.token == token => Ok(Some(agent)),
            _ => Ok(None),
        }
    }

    /// Record a check-in: refresh last-seen, status, version, IP.
    pub fn check_in(
        &self,
        uuid: &str,
        status: AgentStatus,
        version: Option<String>,
        ip: Option<String>,
    ) -> StoreResult<StoredAgent> {
        let write_txn = self.db.inner.begin_write()?;
        let agent = {
            let mut agents = write_txn.open_table(AGENTS)?;
            let existing_bytes = {
                let existing = agents
                    .get(uuid)?
                    .ok_or_else(|| StoreError::NotFound(format!("agent {uuid}")))?;
                existing.value().to_vec()
            };

            let mut agent: StoredAgent = serde_json::from_slice(&existing_bytes)?;
            agent.status = status;
            agent.last_checkin_at = Some(Utc::now());
            if version.is_some() {
                agent.version = version;
            }
            if ip.is_some() {
                agent.ip = ip;
            }

            let json = serde_json::to_vec(&agent)?;
            agents.insert(uuid, json.as_slice())?;
            agent
        };
        write_txn.commit()?;
        Ok(agent)
    }

    /// List all registered agents (admin view).
    pub fn list_all(&self) -> StoreResult<Vec<StoredAgent>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(AGENTS)?;
        let mut agents = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            agents.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(agents)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Fetch the agent's configuration row, defaulting if never written.
    pub fn get_config(&self, uuid: &str) -> StoreResult<AgentConfig> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(AGENT_CONFIGS)?;
        match table.get(uuid)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(AgentConfig::default()),
        }
    }

    /// Replace the agent's configuration row.
    pub fn put_config(&self, uuid: &str, config: &AgentConfig) -> StoreResult<()> {
        let json = serde_json::to_vec(config)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut table = write_txn.open_table(AGENT_CONFIGS)?;
            table.insert(uuid, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Store one metric submission.
    pub fn insert_metrics(&self, record: &MetricRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let key = time_key(
            &record.agent_uuid,
            record.recorded_at.timestamp(),
            &record.id,
        );
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut table = write_txn.open_table(AGENT_METRICS)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// List metric rows for an agent, newest first, up to `limit`.
    pub fn list_metrics(&self, uuid: &str, limit: usize) -> StoreResult<Vec<MetricRecord>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(AGENT_METRICS)?;

        let start = prefix_start(uuid);
        let end = prefix_end(uuid);

        let mut records = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            records.push(serde_json::from_slice(entry.1.value())?);
            if records.len() >= limit {
                break;
            }
        }
        Ok(records)
    }
}
