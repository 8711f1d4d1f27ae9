// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token issuance, validation, and session lifecycle.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets.
//! Every issued token leaves a persisted row keyed by jti; revocation flips
//! that row and pushes the jti onto the blacklist for the token's remaining
//! lifetime. Refresh is single-use: the consumed token is revoked in the
//! same operation that mints its replacement.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage::{
    Db, StoreError, StoredToken, StoredUser, TokenKind, TokenRepository, UserRepository,
};

use super::claims::{AccessClaims, AuthenticatedUser, RefreshClaims};
use super::error::AuthError;
use super::revocation::RevocationChecker;
use super::roles::Role;

/// Clock skew tolerance when validating token timestamps (seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Token lifetimes in seconds, with extended "remember me" variants.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    pub access_secs: i64,
    pub access_remember_secs: i64,
    pub refresh_secs: i64,
    pub refresh_remember_secs: i64,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access_secs: 3_600,                // 1 hour
            access_remember_secs: 2_592_000,   // 30 days
            refresh_secs: 604_800,             // 7 days
            refresh_remember_secs: 5_184_000,  // 60 days
        }
    }
}

/// A freshly minted access/refresh pair, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssuedTokens {
    /// Signed access token
    pub access_token: String,
    /// Signed refresh token
    pub refresh_token: String,
    /// Access token expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues, validates, and revokes session tokens.
pub struct TokenService {
    db: Arc<Db>,
    revocation: Arc<dyn RevocationChecker>,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    ttls: TokenTtls,
}

impl TokenService {
    pub fn new(
        db: Arc<Db>,
        revocation: Arc<dyn RevocationChecker>,
        access_secret: &[u8],
        refresh_secret: &[u8],
        ttls: TokenTtls,
    ) -> Self {
        Self {
            db,
            revocation,
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            ttls,
        }
    }

    /// Issue a new access/refresh pair for a user and persist both rows.
    ///
    /// Role and active flag are snapshotted into the access claims at this
    /// point; the caller is responsible for rejecting inactive accounts
    /// before issuance.
    pub fn issue_pair(
        &self,
        user: &StoredUser,
        origin: &str,
        remember: bool,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<IssuedTokens, AuthError> {
        let now = Utc::now();
        let (access_ttl, refresh_ttl) = if remember {
            (self.ttls.access_remember_secs, self.ttls.refresh_remember_secs)
        } else {
            (self.ttls.access_secs, self.ttls.refresh_secs)
        };
        let access_exp = now + Duration::seconds(access_ttl);
        let refresh_exp = now + Duration::seconds(refresh_ttl);

        let role = if user.administrator {
            Role::Admin
        } else {
            Role::from_str(&user.role).unwrap_or_default()
        };

        let access_claims = AccessClaims {
            sub: user.id.clone(),
            handle: user.handle.clone(),
            role,
            active: user.active,
            origin: origin.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
        };
        let refresh_claims = RefreshClaims {
            sub: user.id.clone(),
            jti: Uuid::new_v4().to_string(),
            origin: origin.to_string(),
            remember,
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
        };

        let access_token = encode(&Header::default(), &access_claims, &self.access_encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let refresh_token = encode(&Header::default(), &refresh_claims, &self.refresh_encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        let repo = TokenRepository::new(&self.db);
        repo.insert(&StoredToken {
            jti: access_claims.jti,
            user_id: user.id.clone(),
            token: access_token.clone(),
            kind: TokenKind::Access,
            issued_at: now,
            expires_at: access_exp,
            revoked: false,
            revoked_by: None,
            revoked_at: None,
            device: device.clone(),
            ip: ip.clone(),
        })
        .map_err(store_internal)?;
        repo.insert(&StoredToken {
            jti: refresh_claims.jti,
            user_id: user.id.clone(),
            token: refresh_token.clone(),
            kind: TokenKind::Refresh,
            issued_at: now,
            expires_at: refresh_exp,
            revoked: false,
            revoked_by: None,
            revoked_at: None,
            device,
            ip,
        })
        .map_err(store_internal)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
        })
    }

    /// Validate an access token and return the authenticated user.
    ///
    /// Checks run in order: signature and expiry, then the revocation
    /// blacklist, then the embedded active flag. The persisted row is not
    /// consulted here; that is the blacklist's job.
    pub async fn validate_access(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = decode_claims::<AccessClaims>(token, &self.access_decoding)?;

        if self.revocation.is_revoked(&claims.jti).await {
            return Err(AuthError::TokenRevoked);
        }
        if !claims.active {
            return Err(AuthError::UserInactive);
        }

        Ok(AuthenticatedUser::from_claims(claims, token))
    }

    /// Exchange a refresh token for a new pair, revoking the consumed one.
    ///
    /// The persisted row is the source of truth here: a refresh token whose
    /// row is missing or flagged revoked is rejected even if the blacklist
    /// is unavailable.
    pub async fn refresh(
        &self,
        token: &str,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<IssuedTokens, AuthError> {
        let claims = decode_claims::<RefreshClaims>(token, &self.refresh_decoding)?;

        let repo = TokenRepository::new(&self.db);
        let row = repo.get(&claims.jti).map_err(store_internal)?;
        let row = match row {
            Some(row) if !row.revoked => row,
            // Missing row means the token was swept or never ours
            _ => return Err(AuthError::TokenRevoked),
        };
        if self.revocation.is_revoked(&claims.jti).await {
            return Err(AuthError::TokenRevoked);
        }

        let user = UserRepository::new(&self.db)
            .get(&claims.sub)
            .map_err(store_internal)?
            .ok_or(AuthError::TokenRevoked)?;
        if !user.active {
            return Err(AuthError::UserInactive);
        }

        // Single use: retire the consumed token before minting replacements
        repo.revoke(&claims.jti, &claims.sub).map_err(store_internal)?;
        self.revocation
            .revoke(&claims.jti, remaining_ttl(row.expires_at))
            .await;

        self.issue_pair(&user, &claims.origin, claims.remember, device, ip)
    }

    /// Revoke the presented access token ("logout").
    ///
    /// The paired refresh token is left alive; clients that want a full
    /// session teardown call [`Self::logout_all`].
    pub async fn logout(&self, user: &AuthenticatedUser) -> Result<(), AuthError> {
        let repo = TokenRepository::new(&self.db);
        match repo.revoke(&user.jti, &user.user_id) {
            Ok(_) => {}
            // A swept row is already as revoked as it gets
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(store_internal(e)),
        }
        self.revocation
            .revoke(&user.jti, remaining_ttl_secs(user.expires_at))
            .await;
        Ok(())
    }

    /// Whether the revocation blacklist backend is reachable.
    pub async fn revocation_healthy(&self) -> bool {
        self.revocation.healthy().await
    }

    /// Revoke every live token owned by a user. Returns the count revoked.
    pub async fn logout_all(&self, user_id: &str, revoked_by: &str) -> Result<usize, AuthError> {
        let revoked = TokenRepository::new(&self.db)
            .revoke_all_for_user(user_id, revoked_by)
            .map_err(store_internal)?;
        for token in &revoked {
            self.revocation
                .revoke(&token.jti, remaining_ttl(token.expires_at))
                .await;
        }
        Ok(revoked.len())
    }
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored Argon2 hash.
///
/// Any parse or verification failure is "wrong password"; callers never
/// learn whether the stored hash was malformed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

fn decode_claims<T: serde::de::DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
) -> Result<T, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::MalformedToken,
        })
}

fn store_internal(e: StoreError) -> AuthError {
    AuthError::InternalError(e.to_string())
}

fn remaining_ttl(expires_at: DateTime<Utc>) -> StdDuration {
    let secs = (expires_at - Utc::now()).num_seconds().max(0);
    StdDuration::from_secs(secs as u64)
}

fn remaining_ttl_secs(expires_at: i64) -> StdDuration {
    let secs = (expires_at - Utc::now().timestamp()).max(0);
    StdDuration::from_secs(secs as u64)
}
