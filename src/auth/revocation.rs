// SPDX-License-Identifier: AGPL-3.0-or-later

//! Revocation blacklist.
//!
//! Maps a token's jti to a "blacklisted" marker with a TTL equal to the
//! token's remaining lifetime. The contract is deliberately weak: absence of
//! a key means "not known to be revoked", not "guaranteed valid". The
//! persisted `revoked` flag in the token store remains the source of truth
//! for audits; this cache only keeps store lookups off the hot path.
//!
//! ## Fail-open policy
//!
//! If the external cache is unreachable, lookups return "not revoked" and
//! writes are dropped, both logged as warnings. Authentication must keep
//! functioning through a cache outage; availability wins over immediate
//! revocation propagation here.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

/// Capability interface for revocation lookups.
///
/// Two implementations exist: a Redis-backed blacklist and a no-op that
/// never revokes, selected by configuration at startup. Handlers depend on
/// the trait so the choice stays in one place.
#[async_trait]
pub trait RevocationChecker: Send + Sync {
    /// Whether this jti is known to be revoked. Must never error.
    async fn is_revoked(&self, jti: &str) -> bool;

    /// Record a jti as revoked for `ttl`. Best-effort; must never error.
    async fn revoke(&self, jti: &str, ttl: Duration);

    /// Whether the backing store is reachable. Health endpoints surface
    /// this as a per-check field; a degraded blacklist never fails the
    /// overall probe.
    async fn healthy(&self) -> bool {
        true
    }
}

/// Redis-backed blacklist.
pub struct RedisRevocationList {
    conn: redis::aio::ConnectionManager,
}

impl RedisRevocationList {
    /// Connect to the blacklist. A failed initial connection surfaces as an
    /// error so the caller can fall back to [`NoopRevocationList`]; outages
    /// after a successful connect are handled fail-open.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(jti: &str) -> String {
        format!("revoked:{jti}")
    }
}

#[async_trait]
impl RevocationChecker for RedisRevocationList {
    async fn is_revoked(&self, jti: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(Self::key(jti)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, jti, "Revocation lookup failed, treating as not revoked");
                false
            }
        }
    }

    async fn revoke(&self, jti: &str, ttl: Duration) {
        // Redis rejects a zero TTL; clamp to one second
        let secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(Self::key(jti), 1u8, secs).await {
            warn!(error = %e, jti, "Failed to blacklist token identifier");
        }
    }

    async fn healthy(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// No-op checker used when no cache endpoint is configured.
///
/// With this implementation revocation is only enforced where the persisted
/// flag is consulted (refresh and audits), not on per-request validation.
pub struct NoopRevocationList;

#[async_trait]
impl RevocationChecker for NoopRevocationList {
    async fn is_revoked(&self, _jti: &str) -> bool {
        false
    }

    async fn revoke(&self, _jti: &str, _ttl: Duration) {}
}
