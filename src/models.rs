// SPDX-License-Identifier: AGPL-3.0-or-later

//! # API Data Models
//!
//! Request and response data structures used by the REST API. All types
//! derive `Serialize`/`Deserialize` and `ToSchema` for automatic JSON
//! handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, login, refresh, session responses
//! - **Users**: profile views and admin account management
//! - **Groups**: group CRUD and membership
//! - **Tickets**: helpdesk tickets, comments, escalations
//! - **Agents**: monitoring agent registration, check-in, metrics, alerts
//! - **Reports**: bug and debug report submission

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::IssuedTokens;
use crate::storage::{
    AlertSeverity, AlertStatus, StoredUser, TicketPriority, TicketStatus,
};

// =============================================================================
// Shared
// =============================================================================

/// Generic success envelope for operations with no payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// User record as exposed via the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub handle: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub administrator: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for PublicUser {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            handle: user.handle,
            email: user.email,
            role: user.role,
            active: user.active,
            administrator: user.administrator,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub handle: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login handle or email address
    pub handle: String,
    pub password: String,
    /// Extends token lifetimes when set
    #[serde(default)]
    pub remember: bool,
    /// Optional device label recorded with the session
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login/register/refresh response: identity plus a fresh token pair.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: IssuedTokens,
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

// =============================================================================
// Groups
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Tickets
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub assignee_user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTicketRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub assignee_user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeTicketStatusRequest {
    pub status: TicketStatus,
    /// Free-text note recorded in the history entry
    #[serde(default)]
    pub note: Option<String>,
    /// Optional comment posted atomically with the transition
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EscalateTicketRequest {
    pub reason: String,
}

// =============================================================================
// Agents
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterAgentRequest {
    #[serde(default)]
    pub owner_user_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Registration response. The shared secret is only shown here, once.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterAgentResponse {
    pub success: bool,
    pub uuid: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AgentCheckinRequest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAlertRequest {
    #[serde(default)]
    pub service: Option<String>,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notification_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeAlertStatusRequest {
    pub status: AlertStatus,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    pub kind: crate::storage::ReportKind,
    pub summary: String,
    /// Arbitrary structured payload (stack traces, environment dumps, ...)
    #[serde(default)]
    pub detail: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_drops_password_hash() {
        let now = Utc::now();
        let user = StoredUser {
            id: "u-1".to_string(),
            handle: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "secret-hash".to_string(),
            role: "user".to_string(),
            active: true,
            administrator: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("alice"));
    }

    #[test]
    fn login_request_defaults() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"handle":"alice","password":"pw"}"#).unwrap();
        assert!(!req.remember);
        assert!(req.device.is_none());
    }
}
