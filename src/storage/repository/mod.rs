// SPDX-License-Identifier: AGPL-3.0-or-later

//! Repository layer providing typed access to the embedded database.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! sharing the single [`crate::storage::Db`] handle for all table access.

pub mod agents;
pub mod alerts;
pub mod groups;
pub mod reports;
pub mod tickets;
pub mod tokens;
pub mod users;

pub use agents::{AgentConfig, AgentRepository, AgentStatus, MetricRecord, StoredAgent};
pub use alerts::{AlertRepository, AlertSeverity, AlertStatus, StoredAlert};
pub use groups::{GroupRepository, StoredGroup};
pub use reports::{ReportKind, ReportRepository, StoredReport};
pub use tickets::{
    StoredTicket, TicketComment, TicketEscalation, TicketHistoryEntry, TicketPriority,
    TicketRepository, TicketStatus,
};
pub use tokens::{StoredToken, TokenKind, TokenRepository};
pub use users::{StoredUser, UserRepository};
