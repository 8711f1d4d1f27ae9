// SPDX-License-Identifier: AGPL-3.0-or-later

//! LRU cache for token validation results.
//!
//! Caches the authenticated identity per raw token so repeated requests
//! within a short window skip signature verification and the revocation
//! lookup. The short TTL bounds how long a revoked token can keep
//! authenticating from the cache; logout invalidates its own entry
//! immediately.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::claims::AuthenticatedUser;

/// Cached entry: resolved identity + insertion timestamp.
struct CacheEntry {
    user: AuthenticatedUser,
    inserted_at: Instant,
}

/// In-process LRU cache for hot token validation lookups.
pub struct ValidationCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl ValidationCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// - `capacity`: Max number of distinct tokens to cache.
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
            ttl,
        }
    }

    /// Get the cached identity for a raw token.
    ///
    /// Returns `None` if not cached, expired in the cache, or the token
    /// itself has passed its expiry since the entry was written.
    pub fn get(&self, token: &str) -> Option<AuthenticatedUser> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(token) {
            let token_live = chrono::Utc::now().timestamp() < entry.user.expires_at;
            if entry.inserted_at.elapsed() < self.ttl && token_live {
                return Some(entry.user.clone());
            }
            // Expired — remove it
            cache.pop(token);
        }
        None
    }

    /// Store a validated identity for a raw token.
    pub fn put(&self, token: &str, user: AuthenticatedUser) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                token.to_string(),
                CacheEntry {
                    user,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Invalidate the entry for a specific raw token.
    ///
    /// Called on logout so the revoked token stops authenticating
    /// immediately instead of riding out the TTL.
    pub fn invalidate(&self, token: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;

    fn sample_user(expires_at: i64) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "user-1".to_string(),
            handle: "alice".to_string(),
            role: Role::User,
            origin: "web".to_string(),
            jti: "jti-1".to_string(),
            expires_at,
            raw_token: "tok".to_string(),
        }
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn cache_put_and_get() {
        let cache = ValidationCache::new(10, Duration::from_secs(60));
        assert!(cache.get("tok-a").is_none());

        cache.put("tok-a", sample_user(far_future()));

        let user = cache.get("tok-a").unwrap();
        assert_eq!(user.handle, "alice");
    }

    #[test]
    fn cache_invalidate() {
        let cache = ValidationCache::new(10, Duration::from_secs(60));
        cache.put("tok-a", sample_user(far_future()));
        assert!(cache.get("tok-a").is_some());

        cache.invalidate("tok-a");
        assert!(cache.get("tok-a").is_none());
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = ValidationCache::new(10, Duration::from_millis(1));
        cache.put("tok-a", sample_user(far_future()));

        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("tok-a").is_none());
    }

    #[test]
    fn cache_drops_expired_tokens() {
        let cache = ValidationCache::new(10, Duration::from_secs(60));
        // Token already past its exp must never be served from cache
        cache.put("tok-a", sample_user(chrono::Utc::now().timestamp() - 1));
        assert!(cache.get("tok-a").is_none());
    }
}
