//! CRUD operations for [`Comment`] records.
//!
//! Comments form a per-post tree through `parent_id`.  The store keeps them
//! flat; the HTTP layer reconstructs the forest on read.  Soft-deleted
//! comments keep their row so descendants stay attached.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Author, Comment, CommentRecord};
use crate::rows::parse_ts;

/// Body shown (and stored) for soft-deleted comments.
pub const DELETED_BODY: &str = "[deleted]";

const SELECT_RECORD: &str = "SELECT c.id, c.post_id, c.author_id, c.parent_id, c.body_md,
        c.is_deleted, c.created_at, c.updated_at, u.nickname, u.is_admin
 FROM comments c
 JOIN users u ON u.id = c.author_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new comment.
    ///
    /// When `parent_id` is given, the parent must be a comment of the same
    /// post; anything else is [`StoreError::InvalidParent`].  This is the
    /// single place the same-post invariant is enforced -- the tree builder
    /// downstream relies on it.
    pub fn create_comment(
        &self,
        post_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        body_md: &str,
    ) -> Result<CommentRecord> {
        if let Some(pid) = parent_id {
            let parent_post: Option<i64> = self
                .conn()
                .query_row(
                    "SELECT post_id FROM comments WHERE id = ?1",
                    params![pid],
                    |row| row.get(0),
                )
                .optional()?;
            if parent_post != Some(post_id) {
                return Err(StoreError::InvalidParent);
            }
        }

        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO comments (post_id, author_id, parent_id, body_md, is_deleted,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![post_id, author_id, parent_id, body_md, now],
        )?;

        self.get_comment(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single comment with its author.
    pub fn get_comment(&self, id: i64) -> Result<CommentRecord> {
        let sql = format!("{SELECT_RECORD} WHERE c.id = ?1");
        self.conn()
            .query_row(&sql, params![id], row_to_record)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All comments of a post, ascending by creation time.  Equal timestamps
    /// keep insertion order via the id tie-break, which is what the tree
    /// builder expects.
    pub fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            "{SELECT_RECORD} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![post_id], row_to_record)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a comment's body.  Soft-deleted comments are no longer
    /// editable and are reported as missing.
    pub fn update_comment(&self, id: i64, body_md: &str) -> Result<CommentRecord> {
        let affected = self.conn().execute(
            "UPDATE comments SET body_md = ?1, updated_at = ?2
             WHERE id = ?3 AND is_deleted = 0",
            params![body_md, Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_comment(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Soft-delete a comment: the row stays (descendants remain attached),
    /// the body is replaced by the fixed placeholder.
    pub fn soft_delete_comment(&self, id: i64) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE comments SET is_deleted = 1, body_md = ?1, updated_at = ?2
             WHERE id = ?3",
            params![DELETED_BODY, Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map a joined `rusqlite::Row` to a [`CommentRecord`].
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRecord> {
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(CommentRecord {
        comment: Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            parent_id: row.get(3)?,
            body_md: row.get(4)?,
            is_deleted: row.get(5)?,
            created_at: parse_ts(6, &created_str)?,
            updated_at: parse_ts(7, &updated_str)?,
        },
        author: Author {
            id: row.get(2)?,
            nickname: row.get(8)?,
            is_admin: row.get(9)?,
        },
    })
}
