// SPDX-License-Identifier: AGPL-3.0-or-later

//! Helpdesk ticket repository.
//!
//! A ticket is the parent row; comments, history entries, and escalations are
//! append-only child rows keyed `(ticket_id|seq_be)`. Sequence counters live
//! on the ticket row itself so a status change, its history entry, and an
//! optional comment all commit in one write transaction — a crash can never
//! leave a status flip without its audit trail.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    prefix_end, prefix_start, seq_key, Db, StoreError, StoreResult, TICKETS, TICKET_COMMENTS,
    TICKET_ESCALATIONS, TICKET_HISTORY,
};

/// Ticket lifecycle status.
///
/// Main line: open → in_progress → resolved → closed.
/// Escalated is a side branch reachable from open/in_progress and returns
/// to the main line via in_progress or resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    Escalated,
}

impl TicketStatus {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        match (self, next) {
            (TicketStatus::Open, TicketStatus::InProgress)
            | (TicketStatus::Open, TicketStatus::Escalated)
            | (TicketStatus::InProgress, TicketStatus::Resolved)
            | (TicketStatus::InProgress, TicketStatus::Escalated)
            | (TicketStatus::Escalated, TicketStatus::InProgress)
            | (TicketStatus::Escalated, TicketStatus::Resolved)
            | (TicketStatus::Resolved, TicketStatus::Closed) => true,
            _ => false,
        }
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Ticket as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredTicket {
    /// Unique ticket identifier (UUID)
    pub id: String,
    /// Short subject line
    pub subject: String,
    /// Full description
    pub body: String,
    /// Lifecycle status
    pub status: TicketStatus,
    /// Priority
    pub priority: TicketPriority,
    /// Creating user
    pub creator_user_id: String,
    /// Assigned user, if any
    pub assignee_user_id: Option<String>,
    /// Free-text category label
    pub category: Option<String>,
    /// Sequence counters for the append-only child tables
    #[serde(default)]
    pub comment_seq: u64,
    #[serde(default)]
    pub history_seq: u64,
    #[serde(default)]
    pub escalation_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ticket comment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TicketComment {
    pub seq: u64,
    pub ticket_id: String,
    pub author_user_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only ticket history entry recording a status change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TicketHistoryEntry {
    pub seq: u64,
    pub ticket_id: String,
    pub actor_user_id: String,
    pub from_status: TicketStatus,
    pub to_status: TicketStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only escalation record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TicketEscalation {
    pub seq: u64,
    pub ticket_id: String,
    pub escalated_by_user_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for tickets and their child records.
pub struct TicketRepository<'a> {
    db: &'a Db,
}

impl<'a> TicketRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a new ticket.
    pub fn create(&self, ticket: &StoredTicket) -> StoreResult<()> {
        let json = serde_json::to_vec(ticket)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut tickets = write_txn.open_table(TICKETS)?;
            if tickets.get(ticket.id.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("ticket {}", ticket.id)));
            }
            tickets.insert(ticket.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a ticket by id.
    pub fn get(&self, ticket_id: &str) -> StoreResult<Option<StoredTicket>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(TICKETS)?;
        match table.get(ticket_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all tickets.
    pub fn list_all(&self) -> StoreResult<Vec<StoredTicket>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(TICKETS)?;
        let mut tickets = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            tickets.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(tickets)
    }

    /// Update mutable ticket fields (subject, body, priority, assignee,
    /// category). Status changes go through [`Self::change_status`].
    pub fn update(&self, ticket: &StoredTicket) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut tickets = write_txn.open_table(TICKETS)?;
            if tickets.get(ticket.id.as_str())?.is_none() {
                return Err(StoreError::NotFound(format!("ticket {}", ticket.id)));
            }
            let json = serde_json::to_vec(ticket)?;
            tickets.insert(ticket.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Change ticket status, writing the history entry and an optional
    /// comment in the same transaction.
    pub fn change_status(
        &self,
        ticket_id: &str,
        next: TicketStatus,
        actor_user_id: &str,
        note: Option<String>,
        comment_body: Option<String>,
    ) -> StoreResult<StoredTicket> {
        let now = Utc::now();
        let write_txn = self.db.inner.begin_write()?;
        let ticket = {
            let mut tickets = write_txn.open_table(TICKETS)?;
            let existing_bytes = {
                let existing = tickets
                    .get(ticket_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("ticket {ticket_id}")))?;
                existing.value().to_vec()
            };

            let mut ticket: StoredTicket = serde_json::from_slice(&existing_bytes)?;
            if !ticket.status.can_transition_to(next) {
                return Err(StoreError::Conflict(format!(
                    "ticket {ticket_id}: cannot move from {:?} to {:?}",
                    ticket.status, next
                )));
            }

            let from = ticket.status;
            ticket.status = next;
            ticket.updated_at = now;
            ticket.history_seq += 1;

            let history = TicketHistoryEntry {
                seq: ticket.history_seq,
                ticket_id: ticket_id.to_string(),
                actor_user_id: actor_user_id.to_string(),
                from_status: from,
                to_status: next,
                note,
                created_at: now,
            };
            let mut history_table = write_txn.open_table(TICKET_HISTORY)?;
            let hkey = seq_key(ticket_id, history.seq);
            let hjson = serde_json::to_vec(&history)?;
            history_table.insert(hkey.as_slice(), hjson.as_slice())?;

            if let Some(body) = comment_body {
                ticket.comment_seq += 1;
                let comment = TicketComment {
                    seq: ticket.comment_seq,
                    ticket_id: ticket_id.to_string(),
                    author_user_id: actor_user_id.to_string(),
                    body,
                    created_at: now,
                };
                let mut comments = write_txn.open_table(TICKET_COMMENTS)?;
                let ckey = seq_key(ticket_id, comment.seq);
                let cjson = serde_json::to_vec(&comment)?;
                comments.insert(ckey.as_slice(), cjson.as_slice())?;
            }

            let json = serde_json::to_vec(&ticket)?;
            tickets.insert(ticket_id, json.as_slice())?;
            ticket
        };
        write_txn.commit()?;
        Ok(ticket)
    }

    /// Append a comment to a ticket.
    pub fn add_comment(
        &self,
        ticket_id: &str,
        author_user_id: &str,
        body: String,
    ) -> StoreResult<TicketComment> {
        let now = Utc::now();
        let write_txn = self.db.inner.begin_write()?;
        let comment = {
            let mut tickets = write_txn.open_table(TICKETS)?;
            let existing_bytes = {
                let existing = tickets
                    .get(ticket_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("ticket {ticket_id}")))?;
                existing.value().to_vec()
            };

            let mut ticket: StoredTicket = serde_json::from_slice(&existing_bytes)?;
            ticket.comment_seq += 1;
            ticket.updated_at = now;

            let comment = TicketComment {
                seq: ticket.comment_seq,
                ticket_id: ticket_id.to_string(),
                author_user_id: author_user_id.to_string(),
                body,
                created_at: now,
            };
            let mut comments = write_txn.open_table(TICKET_COMMENTS)?;
            let ckey = seq_key(ticket_id, comment.seq);
            let cjson = serde_json::to_vec(&comment)?;
            comments.insert(ckey.as_slice(), cjson.as_slice())?;

            let json = serde_json::to_vec(&ticket)?;
            tickets.insert(ticket_id, json.as_slice())?;
            comment
        };
        write_txn.commit()?;
        Ok(comment)
    }

    /// Escalate a ticket: status flip, history entry, and escalation record
    /// in one transaction.
    pub fn escalate(
        &self,
        ticket_id: &str,
        escalated_by: &str,
        reason: String,
    ) -> StoreResult<StoredTicket> {
        let now = Utc::now();
        let write_txn = self.db.inner.begin_write()?;
        let ticket = {
            let mut tickets = write_txn.open_table(TICKETS)?;
            let existing_bytes = {
                let existing = tickets
                    .get(ticket_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("ticket {ticket_id}")))?;
                existing.value().to_vec()
            };

            let mut ticket: StoredTicket = serde_json::from_slice(&existing_bytes)?;
            if !ticket.status.can_transition_to(TicketStatus::Escalated) {
                return Err(StoreError::Conflict(format!(
                    "ticket {ticket_id}: cannot escalate from {:?}",
                    ticket.status
                )));
            }

            let from = ticket.status;
            ticket.status = TicketStatus::Escalated;
            ticket.updated_at = now;
            ticket.history_seq += 1;
            ticket.escalation_seq += 1;

            let history = TicketHistoryEntry {
                seq: ticket.history_seq,
                ticket_id: ticket_id.to_string(),
                actor_user_id: escalated_by.to_string(),
                from_status: from,
                to_status: TicketStatus::Escalated,
                note: Some(reason.clone()),
                created_at: now,
            };
            let mut history_table = write_txn.open_table(TICKET_HISTORY)?;
            let hkey = seq_key(ticket_id, history.seq);
            let hjson = serde_json::to_vec(&history)?;
            history_table.insert(hkey.as_slice(), hjson.as_slice())?;

            let escalation = TicketEscalation {
                seq: ticket.escalation_seq,
                ticket_id: ticket_id.to_string(),
                escalated_by_user_id: escalated_by.to_string(),
                reason,
                created_at: now,
            };
            let mut escalations = write_txn.open_table(TICKET_ESCALATIONS)?;
            let ekey = seq_key(ticket_id, escalation.seq);
            let ejson = serde_json::to_vec(&escalation)?;
            escalations.insert(ekey.as_slice(), ejson.as_slice())?;

            let json = serde_json::to_vec(&ticket)?;
            tickets.insert(ticket_id, json.as_slice())?;
            ticket
        };
        write_txn.commit()?;
        Ok(ticket)
    }

    /// List comments for a ticket in insertion order.
    pub fn list_comments(&self, ticket_id: &str) -> StoreResult<Vec<TicketComment>> {
        self.list_children(ticket_id, TICKET_COMMENTS)
    }

    /// List history entries for a ticket in insertion order.
    pub fn list_history(&self, ticket_id: &str) -> StoreResult<Vec<TicketHistoryEntry>> {
        self.list_children(ticket_id, TICKET_HISTORY)
    }

    /// List escalations for a ticket in insertion order.
    pub fn list_escalations(&self, ticket_id: &str) -> StoreResult<Vec<TicketEscalation>> {
        self.list_children(ticket_id, TICKET_ESCALATIONS)
    }

    fn list_children<T: serde::de::DeserializeOwned>(
        &self,
        ticket_id: &str,
        table_def: redb::TableDefinition<&[u8], &[u8]>,
    ) -> StoreResult<Vec<T>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(table_def)?;

        let start = prefix_start(ticket_id);
        let end = prefix_end(ticket_id);

        let mut children = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            children.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(children)
    }
}
