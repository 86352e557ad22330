//! CRUD operations for [`Board`] records.
//!
//! Boards are soft-deleted: the public lookup paths exclude deleted rows,
//! while the admin listing can include them.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Board;
use crate::rows::{map_unique, parse_ts};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new board.  The slug is unique; a duplicate surfaces as
    /// [`StoreError::Conflict`].
    pub fn create_board(&self, name: &str, description: &str, slug: &str) -> Result<Board> {
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO boards (name, description, slug, is_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![name, description, slug, now.to_rfc3339()],
            )
            .map_err(|e| map_unique(e, "slug already exists"))?;

        Ok(Board {
            id: self.conn().last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            slug: slug.to_string(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Resolve a board by slug, excluding soft-deleted boards.
    pub fn get_board_by_slug(&self, slug: &str) -> Result<Board> {
        self.conn()
            .query_row(
                "SELECT id, name, description, slug, is_deleted, created_at, updated_at
                 FROM boards
                 WHERE slug = ?1 AND is_deleted = 0",
                params![slug],
                row_to_board,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a board by id regardless of its soft-delete flag.  Admin paths
    /// need to reach deleted boards to edit or restore them.
    pub fn get_board(&self, id: i64) -> Result<Board> {
        self.conn()
            .query_row(
                "SELECT id, name, description, slug, is_deleted, created_at, updated_at
                 FROM boards WHERE id = ?1",
                params![id],
                row_to_board,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List boards ordered by creation date ascending.
    ///
    /// `include_deleted` is only ever true for the admin listing.
    pub fn list_boards(&self, include_deleted: bool) -> Result<Vec<Board>> {
        let sql = if include_deleted {
            "SELECT id, name, description, slug, is_deleted, created_at, updated_at
             FROM boards ORDER BY created_at ASC, id ASC"
        } else {
            "SELECT id, name, description, slug, is_deleted, created_at, updated_at
             FROM boards WHERE is_deleted = 0 ORDER BY created_at ASC, id ASC"
        };

        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], row_to_board)?;

        let mut boards = Vec::new();
        for row in rows {
            boards.push(row?);
        }
        Ok(boards)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a partial update.  `None` fields keep their current value.
    pub fn update_board(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
        slug: Option<&str>,
    ) -> Result<Board> {
        let current = self.get_board(id)?;
        let now = Utc::now();

        self.conn()
            .execute(
                "UPDATE boards SET name = ?1, description = ?2, slug = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    name.unwrap_or(&current.name),
                    description.unwrap_or(&current.description),
                    slug.unwrap_or(&current.slug),
                    now.to_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| map_unique(e, "slug already exists"))?;

        self.get_board(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Soft-delete a board.  Its posts stay in place but become unreachable
    /// through the public lookup paths.
    pub fn soft_delete_board(&self, id: i64) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE boards SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Board`].
fn row_to_board(row: &rusqlite::Row<'_>) -> rusqlite::Result<Board> {
    let created_str: String = row.get(5)?;
    let updated_str: String = row.get(6)?;
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        slug: row.get(3)?,
        is_deleted: row.get(4)?,
        created_at: parse_ts(5, &created_str)?,
        updated_at: parse_ts(6, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lookup_excludes_deleted() {
        let db = Database::open_in_memory().unwrap();
        let board = db.create_board("General", "anything goes", "general").unwrap();

        assert_eq!(db.get_board_by_slug("general").unwrap().id, board.id);

        db.soft_delete_board(board.id).unwrap();
        match db.get_board_by_slug("general") {
            Err(StoreError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }

        // Admin paths can still reach the row.
        assert!(db.get_board(board.id).unwrap().is_deleted);
        assert_eq!(db.list_boards(false).unwrap().len(), 0);
        assert_eq!(db.list_boards(true).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_slug_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_board("A", "", "general").unwrap();

        match db.create_board("B", "", "general") {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let board = db.create_board("General", "desc", "general").unwrap();

        let updated = db
            .update_board(board.id, Some("Renamed"), None, None)
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.description, "desc");
        assert_eq!(updated.slug, "general");
    }
}
