// SPDX-License-Identifier: AGPL-3.0-or-later

//! Group repository.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    composite_key, prefix_end, prefix_start, Db, StoreError, StoreResult, GROUPS, GROUP_MEMBERS,
    GROUP_NAMES,
};

/// Group as persisted. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredGroup {
    /// Unique group identifier (UUID)
    pub id: String,
    /// Unique group name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for groups and their membership index.
pub struct GroupRepository<'a> {
    db: &'a Db,
}

impl<'a> GroupRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create a group, claiming its name atomically.
    pub fn create(&self, group: &StoredGroup) -> StoreResult<()> {
        let json = serde_json::to_vec(group)?;
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut names = write_txn.open_table(GROUP_NAMES)?;
            if names.get(group.name.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("group {}", group.name)));
            }
            names.insert(group.name.as_str(), group.id.as_str())?;

            let mut groups = write_txn.open_table(GROUPS)?;
            groups.insert(group.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a group by id.
    pub fn get(&self, group_id: &str) -> StoreResult<Option<StoredGroup>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(GROUPS)?;
        match table.get(group_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List all groups.
    pub fn list_all(&self) -> StoreResult<Vec<StoredGroup>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(GROUPS)?;
        let mut groups = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            groups.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(groups)
    }

    /// Update the description. The name is immutable once claimed.
    pub fn update(&self, group: &StoredGroup) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut groups = write_txn.open_table(GROUPS)?;
            if groups.get(group.id.as_str())?.is_none() {
                return Err(StoreError::NotFound(format!("group {}", group.id)));
            }
            let json = serde_json::to_vec(group)?;
            groups.insert(group.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a group, its name claim, and all membership rows.
    pub fn delete(&self, group_id: &str) -> StoreResult<()> {
        let group = self
            .get(group_id)?
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))?;
        let members = self.list_members(group_id)?;

        let write_txn = self.db.inner.begin_write()?;
        {
            let mut groups = write_txn.open_table(GROUPS)?;
            groups.remove(group_id)?;

            let mut names = write_txn.open_table(GROUP_NAMES)?;
            names.remove(group.name.as_str())?;

            let mut membership = write_txn.open_table(GROUP_MEMBERS)?;
            for user_id in &members {
                let key = composite_key(group_id, user_id);
                membership.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Add a user to a group. Idempotent.
    pub fn add_member(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        if self.get(group_id)?.is_none() {
            return Err(StoreError::NotFound(format!("group {group_id}")));
        }
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut membership = write_txn.open_table(GROUP_MEMBERS)?;
            let key = composite_key(group_id, user_id);
            membership.insert(key.as_slice(), user_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove a user from a group.
    pub fn remove_member(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        let write_txn = self.db.inner.begin_write()?;
        {
            let mut membership = write_txn.open_table(GROUP_MEMBERS)?;
            let key = composite_key(group_id, user_id);
            if membership.remove(key.as_slice())?.is_none() {
                return Err(StoreError::NotFound(format!(
                    "user {user_id} in group {group_id}"
                )));
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// List user ids belonging to a group.
    pub fn list_members(&self, group_id: &str) -> StoreResult<Vec<String>> {
        let read_txn = self.db.inner.begin_read()?;
        let table = read_txn.open_table(GROUP_MEMBERS)?;

        let start = prefix_start(group_id);
        let end = prefix_end(group_id);

        let mut members = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            members.push(entry.1.value().to_string());
        }
        Ok(members)
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

    fn sample_group(id: &str, name: &str) -> StoredGroup {
        StoredGroup {
            id: id.to_string(),
            name: name.to_string(),
            description: Some("ops staff".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_get_and_unique_name() {
        let (db, _dir) = temp_db();
        let repo = GroupRepository::new(&db);
        repo.create(&sample_group("g-1", "ops")).unwrap();

        assert!(repo.get("g-1").unwrap().is_some());

        let dup = repo.create(&sample_group("g-2", "ops"));
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn membership_add_remove_list() {
        let (db, _dir) = temp_db();
        let repo = GroupRepository::new(&db);
        repo.create(&sample_group("g-1", "ops")).unwrap();

        repo.add_member("g-1", "u-1").unwrap();
        repo.add_member("g-1", "u-2").unwrap();
        // Idempotent
        repo.add_member("g-1", "u-1").unwrap();

        let members = repo.list_members("g-1").unwrap();
        assert_eq!(members.len(), 2);

        repo.remove_member("g-1", "u-1").unwrap();
        assert_eq!(repo.list_members("g-1").unwrap(), vec!["u-2".to_string()]);

        let missing = repo.remove_member("g-1", "u-9");
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn add_member_to_missing_group_fails() {
        let (db, _dir) = temp_db();
        let repo = GroupRepository::new(&db);
        let result = repo.add_member("ghost", "u-1");
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_name_claim_and_members() {
        let (db, _dir) = temp_db();
        let repo = GroupRepository::new(&db);
        repo.create(&sample_group("g-1", "ops")).unwrap();
        repo.add_member("g-1", "u-1").unwrap();

        repo.delete("g-1").unwrap();
        assert!(repo.get("g-1").unwrap().is_none());
        assert!(repo.list_members("g-1").unwrap().is_empty());

        // Name is free again
        repo.create(&sample_group("g-2", "ops")).unwrap();
    }
}
