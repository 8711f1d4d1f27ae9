// SPDX-License-Identifier: AGPL-3.0-or-later

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims embedded in an access token.
///
/// The role and active flag are snapshots taken at issuance; per-request
/// validation reads them from the token rather than re-querying the store.
/// Deactivation therefore propagates only when the access token expires or
/// is revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Login handle
    pub handle: String,
    /// Role tier at issuance
    pub role: Role,
    /// Active flag at issuance
    pub active: bool,
    /// Origin label ("web", "cli", ...)
    pub origin: String,
    /// Unique token identifier, the revocation key
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Claims embedded in a refresh token.
///
/// Deliberately minimal: refresh tokens only mint new pairs, they never
/// authorize API calls, so no role or active flag is carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Unique token identifier, the revocation key
    pub jti: String,
    /// Origin label carried over from the original login
    pub origin: String,
    /// Whether the session was opened with extended lifetimes
    #[serde(default)]
    pub remember: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Authenticated user information extracted from a validated access token.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Login handle
    pub handle: String,

    /// User's role
    pub role: Role,

    /// Origin label from the token
    pub origin: String,

    /// Token identifier (used for logout/revocation, not serialized)
    #[serde(skip)]
    pub jti: String,

    /// Token expiration (Unix timestamp, used for revocation TTLs, not serialized)
    #[serde(skip)]
    pub expires_at: i64,

    /// The raw token string (used for cache invalidation, not serialized)
    #[serde(skip)]
    pub raw_token: String,
}

impl AuthenticatedUser {
    /// Create from validated access claims and the raw token they came from.
    pub fn from_claims(claims: AccessClaims, raw_token: &str) -> Self {
        Self {
            user_id: claims.sub,
            handle: claims.handle,
            role: claims.role,
            origin: claims.origin,
            jti: claims.jti,
            expires_at: claims.exp,
            raw_token: raw_token.to_string(),
        }
    }

    /// Check if the user has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
