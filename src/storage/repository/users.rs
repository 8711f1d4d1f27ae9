// SPDX-License-Identifier: AGPL-3.0-or-later

//! User repository.
//!
//! Users are the credential store: hashed password, role tier, active flag.
//! Handle and email uniqueness is enforced through dedicated index tables
//! inside the same write transaction as the user row itself.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{Db, StoreError, StoreResult, USERS, USER_EMAILS, USER_HANDLES};

/// User record as persisted.
///
/// Users are never hard-deleted; deactivation flips `active` instead.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Unique login handle
    pub handle: String,
    /// Unique email address
    pub email: String,
    /// Argon2 password hash (never exposed via API)
    pub password_hash: String,
    /// Free-text role tier ("user", "admin", ...)
    pub role: String,
    /// Whether the account may authenticate
    pub active: bool,
    /// Administrator flag (grants the admin role at token issuance)
    pub administrator: bool,
    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Last profile mutation
    pub updated_at: DateTime<Utc>,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    db: &'a Db,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a new user, claiming the handle and email atomically.
    pub fn create(&self, user: &StoredUser) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut handles = write_txn.open_table(USER_HANDLES)?;
            if handles.get(user.handle.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!(
                    "handle {}",
                    user.handle
                )));
            }
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            if emails.get(user.email.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("email {}", user.email)));
            }

            handles.insert(user.handle.as_str(), user.id.as_str())?;
            emails.insert(user.email.as_str(), user.id.as_str())?;

            let json = serde_json::to_vec(user)?;
            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a user by id.
    pub fn get(&self, user_id: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by login handle.
    pub fn find_by_handle(&self, handle: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.inner.begin_read()?;
        let handles = read_txn.open_table(USER_HANDLES)?;
        let user_id = match handles.get(handle)? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };
        drop(handles);
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by email address.
    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.inner.begin_read()?;
        let emails = read_txn.open_table(USER_EMAILS)?;
        let user_id = match emails.get(email)? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };
        drop(emails);
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Overwrite an existing user row.
    ///
    /// Handle and email are immutable once claimed; callers must not change
    /// them through this path.
    pub fn update(&self, user: &StoredUser) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(user.id.as_str())?.is_none() {
                return Err(StoreError::NotFound(format!("user {}", user.id)));
            }
            let json = serde_json::to_vec(user)?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Refresh the last-login timestamp.
    pub fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.mutate(user_id, |user| {
            user.last_login_at = Some(at);
        })
    }

    /// Flip the active flag (admin deactivation/reactivation).
    pub fn set_active(&self, user_id: &str, active: bool) -> StoreResult<()> {
        self.mutate(user_id, |user| {
            user.active = active;
            user.updated_at = Utc::now();
        })
    }

    /// Replace the stored password hash.
    pub fn set_password_hash(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        self.mutate(user_id, |user| {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        })
    }

    /// List all users (admin view).
    pub fn list_all(&self) -> StoreResult<Vec<StoredUser>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        let mut users = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            users.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(users)
    }

    /// Read-modify-write a single user row in one transaction.
    fn mutate(&self, user_id: &str, f: impl FnOnce(&mut StoredUser)) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            f(&mut user);

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (Db, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_user(id: &str, handle: &str, email: &str) -> StoredUser {
        StoredUser {
            id: id.to_string(),
            handle: handle.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$test".to_string(),
            role: "user".to_string(),
            active: true,
            administrator: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_lookup_by_handle_and_email() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);

        let user = sample_user("u-1", "alice", "alice@x.com");
        repo.create(&user).unwrap();

        let by_id = repo.get("u-1").unwrap().unwrap();
        assert_eq!(by_id.handle, "alice");

        let by_handle = repo.find_by_handle("alice").unwrap().unwrap();
        assert_eq!(by_handle.id, "u-1");

        let by_email = repo.find_by_email("alice@x.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u-1");

        assert!(repo.find_by_handle("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_handle_rejected() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);

        repo.create(&sample_user("u-1", "alice", "alice@x.com"))
            .unwrap();
        let result = repo.create(&sample_user("u-2", "alice", "other@x.com"));
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));

        // The losing transaction must not leave partial state behind
        assert!(repo.get("u-2").unwrap().is_none());
        assert!(repo.find_by_email("other@x.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);

        repo.create(&sample_user("u-1", "alice", "alice@x.com"))
            .unwrap();
        let result = repo.create(&sample_user("u-2", "bob", "alice@x.com"));
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn set_active_and_touch_last_login() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);
        repo.create(&sample_user("u-1", "alice", "alice@x.com"))
            .unwrap();

        repo.set_active("u-1", false).unwrap();
        assert!(!repo.get("u-1").unwrap().unwrap().active);

        let at = Utc::now();
        repo.touch_last_login("u-1", at).unwrap();
        assert_eq!(repo.get("u-1").unwrap().unwrap().last_login_at, Some(at));
    }

    #[test]
    fn mutate_missing_user_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);
        let result = repo.set_active("no-such-user", false);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_all_returns_every_user() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);
        repo.create(&sample_user("u-1", "alice", "alice@x.com"))
            .unwrap();
        repo.create(&sample_user("u-2", "bob", "bob@x.com")).unwrap();

        let users = repo.list_all().unwrap();
        assert_eq!(users.len(), 2);
    }
}
