// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token repository.
//!
//! Every issued access/refresh token leaves a persisted row keyed by jti.
//! Rows are mutated only to flip `revoked`; the sweeper purges rows once
//! they are past expiry plus a grace window. The persisted `revoked` flag is
//! the source of truth for audits; the external blacklist is a fast path.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    composite_key, prefix_end, prefix_start, Db, StoreError, StoreResult, TOKENS, USER_TOKENS,
};

/// Token kind: short-lived API credential or long-lived refresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Persisted token metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredToken {
    /// Unique token identifier, embedded in the JWT as `jti`
    pub jti: String,
    /// Owning user
    pub user_id: String,
    /// The raw signed token string
    pub token: String,
    /// Access or refresh
    pub kind: TokenKind,
    /// Issuance timestamp
    pub issued_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Revocation flag; flipped once, never cleared
    pub revoked: bool,
    /// Who revoked the token (user id, or "system")
    pub revoked_by: Option<String>,
    /// When the token was revoked
    pub revoked_at: Option<DateTime<Utc>>,
    /// Device label captured at issuance
    pub device: Option<String>,
    /// Client IP captured at issuance
    pub ip: Option<String>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Repository for token rows and the per-user token index.
pub struct TokenRepository<'a> {
    db: &'a Db,
}

impl<'a> TokenRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Persist a freshly issued token and its user-index entry.
    pub fn insert(&self, token: &StoredToken) -> StoreResult<()> {
        let json = serde_json::to_vec(token)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut tokens = write_txn.open_table(TOKENS)?;
            tokens.insert(token.jti.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(USER_TOKENS)?;
            let key = composite_key(&token.user_id, &token.jti);
            index.insert(key.as_slice(), token.jti.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a token row by jti.
    pub fn get(&self, jti: &str) -> StoreResult<Option<StoredToken>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(TOKENS)?;
        match table.get(jti)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Whether the persisted row for this jti is flagged revoked.
    ///
    /// A missing row is treated as not revoked; absence of evidence is not
    /// a revocation (the blacklist contract, §fail-open).
    pub fn is_revoked(&self, jti: &str) -> StoreResult<bool> {
        Ok(self.get(jti)?.map(|t| t.revoked).unwrap_or(false))
    }

    /// Flip the revoked flag on a single token row.
    pub fn revoke(&self, jti: &str, revoked_by: &str) -> StoreResult<StoredToken> {
        let write_txn = self.db.inner.begin_write()?;
        let token = {
            let mut tokens = write_txn.open_table(TOKENS)?;
            let existing_bytes = {
                let existing = tokens
                    .get(jti)?
                    .ok_or_else(|| StoreError::NotFound(format!("token {jti}")))?;
                existing.value().to_vec()
            };

            let mut token: StoredToken = serde_json::from_slice(&existing_bytes)?;
            token.revoked = true;
            token.revoked_by = Some(revoked_by.to_string());
            token.revoked_at = Some(Utc::now());

            let json = serde_json::to_vec(&token)?;
            tokens.insert(jti, json.as_slice())?;
            token
        };
        write_txn.commit()?;
        Ok(token)
    }

    /// Revoke every non-revoked token owned by a user ("logout all").
    ///
    /// Returns the affected tokens so the caller can blacklist each jti.
    pub fn revoke_all_for_user(
        &self,
        user_id: &str,
        revoked_by: &str,
    ) -> StoreResult<Vec<StoredToken>> {
        let jtis = self.list_jtis_for_user(user_id)?;

        let mut revoked = Vec::new();
        let now = Utc::now();
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut tokens = write_txn.open_table(TOKENS)?;
            for jti in &jtis {
                let existing_bytes = match tokens.get(jti.as_str())? {
                    Some(v) => v.value().to_vec(),
                    None => continue,
                };
                let mut token: StoredToken = serde_json::from_slice(&existing_bytes)?;
                if token.revoked {
                    continue;
                }
                token.revoked = true;
                token.revoked_by = Some(revoked_by.to_string());
                token.revoked_at = Some(now);

                let json = serde_json::to_vec(&token)?;
                tokens.insert(jti.as_str(), json.as_slice())?;
                revoked.push(token);
            }
        }
        write_txn.commit()?;
        Ok(revoked)
    }

    /// List all token rows owned by a user.
    pub fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<StoredToken>> {
        let jtis = self.list_jtis_for_user(user_id)?;
        let read_txn = self.db.inner.begin_read()?;
        let tokens = read_txn.open_table(TOKENS)?;

        let mut result = Vec::with_capacity(jtis.len());
        for jti in jtis {
            if let Some(value) = tokens.get(jti.as_str())? {
                result.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(result)
    }

    /// Delete rows whose expiry is older than `cutoff`, along with their
    /// user-index entries. Returns the number of rows removed.
    ///
    /// Unexpired rows are never touched, revoked or not.
    pub fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        // Collect victims under a read transaction first
        let victims: Vec<StoredToken> = {
            let read_txn = self.db.inner.begin_read()?;
            let tokens = read_txn.open_table(TOKENS)?;
            let mut victims = Vec::new();
            for entry in tokens.iter()? {
                let entry = entry?;
                let token: StoredToken = serde_json::from_slice(entry.1.value())?;
                if token.is_expired(cutoff) {
                    victims.push(token);
                }
            }
            victims
        };

        if victims.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.inner.begin_write()?;
        {
            let mut tokens = write_txn.open_table(TOKENS)?;
            let mut index = write_txn.open_table(USER_TOKENS)?;
            for token in &victims {
                tokens.remove(token.jti.as_str())?;
                let key = composite_key(&token.user_id, &token.jti);
                index.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(victims.len())
    }

    fn list_jtis_for_user(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let read_txn = self.db.inner.begin_read()?;
        let index = read_txn.open_table(USER_TOKENS)?;

        let start = prefix_start(user_id);
        let end = prefix_end(user_id);

        let mut jtis = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            jtis.push(entry.1.value().to_string());
        }
        Ok(jtis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_db() -> (Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_token(jti: &str, user_id: &str, kind: TokenKind) -> StoredToken {
        let now = Utc::now();
        StoredToken {
            jti: jti.to_string(),
            user_id: user_id.to_string(),
            token: format!("signed.{jti}"),
            kind,
            issued_at: now,
            expires_at: now + Duration::hours(1),
            revoked: false,
            revoked_by: None,
            revoked_at: None,
            device: Some("cli".to_string()),
            ip: Some("10.0.0.1".to_string()),
        }
    }

    #[test]
    fn insert_and_get() {
        let (db, _dir) = temp_db();
        let repo = TokenRepository::new(&db);

        let token = sample_token("jti-1", "u-1", TokenKind::Access);
        repo.insert(&token).unwrap();

        let loaded = repo.get("jti-1").unwrap().unwrap();
        assert_eq!(loaded, token);
        assert!(repo.get("jti-2").unwrap().is_none());
    }

    #[test]
    fn revoke_flips_flag_once() {
        let (db, _dir) = temp_db();
        let repo = TokenRepository::new(&db);
        repo.insert(&sample_token("jti-1", "u-1", TokenKind::Refresh))
            .unwrap();

        assert!(!repo.is_revoked("jti-1").unwrap());
        let revoked = repo.revoke("jti-1", "u-1").unwrap();
        assert!(revoked.revoked);
        assert_eq!(revoked.revoked_by.as_deref(), Some("u-1"));
        assert!(repo.is_revoked("jti-1").unwrap());
    }

    #[test]
    fn missing_jti_is_not_revoked() {
        let (db, _dir) = temp_db();
        let repo = TokenRepository::new(&db);
        assert!(!repo.is_revoked("ghost").unwrap());
    }

    #[test]
    fn revoke_all_for_user_skips_other_users() {
        let (db, _dir) = temp_db();
        let repo = TokenRepository::new(&db);
        repo.insert(&sample_token("jti-1", "u-1", TokenKind::Access))
            .unwrap();
        repo.insert(&sample_token("jti-2", "u-1", TokenKind::Refresh))
            .unwrap();
        repo.insert(&sample_token("jti-3", "u-2", TokenKind::Access))
            .unwrap();

        let revoked = repo.revoke_all_for_user("u-1", "u-1").unwrap();
        assert_eq!(revoked.len(), 2);

        assert!(repo.is_revoked("jti-1").unwrap());
        assert!(repo.is_revoked("jti-2").unwrap());
        assert!(!repo.is_revoked("jti-3").unwrap());

        // Idempotent: already-revoked rows are not reported again
        let second = repo.revoke_all_for_user("u-1", "u-1").unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn delete_expired_before_leaves_unexpired_rows() {
        let (db, _dir) = temp_db();
        let repo = TokenRepository::new(&db);

        let mut old = sample_token("jti-old", "u-1", TokenKind::Access);
        old.expires_at = Utc::now() - Duration::days(10);
        repo.insert(&old).unwrap();

        let fresh = sample_token("jti-fresh", "u-1", TokenKind::Access);
        repo.insert(&fresh).unwrap();

        let cutoff = Utc::now() - Duration::days(7);
        let removed = repo.delete_expired_before(cutoff).unwrap();
        assert_eq!(removed, 1);

        assert!(repo.get("jti-old").unwrap().is_none());
        assert!(repo.get("jti-fresh").unwrap().is_some());

        // Index entry must be gone as well
        let remaining = repo.list_by_user("u-1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].jti, "jti-fresh");
    }
}
