// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Storage Module
//!
//! Persistence for the operations platform, backed by **redb** (embedded,
//! pure Rust, ACID). One database file holds every table; repositories give
//! typed access per entity.
//!
//! ## Layout
//!
//! ```text
//! users / user_handles / user_emails     credential store + uniqueness maps
//! tokens / user_tokens                   issued JWT metadata + per-user index
//! groups / group_names / group_members
//! tickets / ticket_comments / ticket_history / ticket_escalations
//! agents / agent_configs / agent_metrics
//! alerts / agent_alerts
//! reports
//! ```
//!
//! Multi-step mutations (status change + history + comment, user + uniqueness
//! claims) each run inside a single write transaction.

pub mod database;
pub mod repository;

pub use database::{Db, StoreError, StoreResult};
pub use repository::{
    AgentConfig, AgentRepository, AgentStatus, AlertRepository, AlertSeverity, AlertStatus,
    GroupRepository, MetricRecord, ReportKind, ReportRepository, StoredAgent, StoredAlert,
    StoredGroup, StoredReport, StoredTicket, StoredToken, StoredUser, TicketComment,
    TicketEscalation, TicketHistoryEntry, TicketPriority, TicketRepository, TicketStatus,
    TokenKind, TokenRepository, UserRepository,
};
