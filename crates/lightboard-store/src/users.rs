//! CRUD operations for [`User`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::rows::{map_unique, parse_ts};

impl Database {
    /// Insert a new user.  The nickname is unique; a duplicate surfaces as
    /// [`StoreError::Conflict`].
    pub fn create_user(&self, nickname: &str, password_hash: &str, is_admin: bool) -> Result<User> {
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO users (nickname, password_hash, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![nickname, password_hash, is_admin, now.to_rfc3339()],
            )
            .map_err(|e| map_unique(e, "nickname already in use"))?;

        let id = self.conn().last_insert_rowid();
        Ok(User {
            id,
            nickname: nickname.to_string(),
            password_hash: password_hash.to_string(),
            is_admin,
            created_at: now,
        })
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, nickname, password_hash, is_admin, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a user by nickname, returning `None` when no such user exists.
    pub fn get_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        use rusqlite::OptionalExtension;

        self.conn()
            .query_row(
                "SELECT id, nickname, password_hash, is_admin, created_at
                 FROM users WHERE nickname = ?1",
                params![nickname],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Number of registered users.  Used to decide whether seeding runs.
    pub fn user_count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        nickname: row.get(1)?,
        password_hash: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: parse_ts(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("alice", "hash", false).unwrap();

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.nickname, "alice");
        assert!(!fetched.is_admin);

        let by_name = db.get_user_by_nickname("alice").unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(user.id));
        assert!(db.get_user_by_nickname("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_nickname_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("alice", "hash", false).unwrap();

        match db.create_user("alice", "other", false) {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
}
