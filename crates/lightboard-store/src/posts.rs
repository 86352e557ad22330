//! CRUD and listing operations for [`Post`] records.
//!
//! Post writes and their search-index maintenance always happen in one
//! transaction so the index can never reference a post state that was not
//! committed (see `search.rs` for the index itself).

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Author, Post, PostContent, PostRecord, PostSort};
use crate::rows::parse_ts;
use crate::search;

const SELECT_RECORD: &str = "SELECT p.id, p.board_id, p.author_id, p.title, p.body_md,
        p.og_url, p.og_title, p.og_image, p.like_count, p.view_count,
        p.created_at, p.updated_at, u.nickname, u.is_admin, b.slug
 FROM posts p
 JOIN users u ON u.id = p.author_id
 JOIN boards b ON b.id = p.board_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new post and its search-index entry in one transaction.
    pub fn create_post(
        &mut self,
        board_id: i64,
        author_id: i64,
        content: &PostContent,
    ) -> Result<PostRecord> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO posts (board_id, author_id, title, body_md,
                                og_url, og_title, og_image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                board_id,
                author_id,
                content.title,
                content.body_md,
                content.og_url,
                content.og_title,
                content.og_image,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();

        search::upsert_index_on(&tx, id, &content.title, &content.body_md)?;
        tx.commit()?;

        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a post with its author and board slug.  Posts of soft-deleted
    /// boards are treated as missing.
    pub fn get_post(&self, id: i64) -> Result<PostRecord> {
        let sql = format!("{SELECT_RECORD} WHERE p.id = ?1 AND b.is_deleted = 0");
        self.conn()
            .query_row(&sql, params![id], row_to_record)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Sorted browse scan over one board.
    ///
    /// The caller owns pagination and passes `limit` directly (the feed layer
    /// asks for one row more than the page size to detect further pages).
    pub fn list_posts(
        &self,
        board_id: i64,
        sort: PostSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRecord>> {
        let order = match sort {
            PostSort::Latest => "p.created_at DESC, p.id DESC",
            PostSort::Likes => "p.like_count DESC, p.created_at DESC, p.id DESC",
            PostSort::Views => "p.view_count DESC, p.created_at DESC, p.id DESC",
        };
        let sql =
            format!("{SELECT_RECORD} WHERE p.board_id = ?1 ORDER BY {order} LIMIT ?2 OFFSET ?3");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![board_id, limit, offset], row_to_record)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// Fetch several posts at once, preserving the order of `ids`.  Ids that
    /// resolve to nothing (deleted meanwhile) are skipped.
    pub fn get_posts_by_ids(&self, ids: &[i64]) -> Result<Vec<PostRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let marks = vec!["?"; ids.len()].join(",");
        let sql = format!("{SELECT_RECORD} WHERE p.id IN ({marks})");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), row_to_record)?;

        let mut by_id: HashMap<i64, PostRecord> = HashMap::new();
        for row in rows {
            let record = row?;
            by_id.insert(record.post.id, record);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Single batched membership lookup: which of `post_ids` has `user_id`
    /// liked?  Used to annotate listing pages without one query per post.
    pub fn liked_post_ids(&self, user_id: i64, post_ids: &[i64]) -> Result<HashSet<i64>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let marks = vec!["?"; post_ids.len()].join(",");
        let sql = format!("SELECT post_id FROM likes WHERE user_id = ? AND post_id IN ({marks})");

        let mut stmt = self.conn().prepare(&sql)?;
        let params = std::iter::once(user_id).chain(post_ids.iter().copied());
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| row.get(0))?;

        let mut liked = HashSet::new();
        for row in rows {
            liked.insert(row?);
        }
        Ok(liked)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a post's content and re-index it in one transaction.
    pub fn update_post(&mut self, id: i64, content: &PostContent) -> Result<PostRecord> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn_mut().transaction()?;

        let affected = tx.execute(
            "UPDATE posts SET title = ?1, body_md = ?2,
                              og_url = ?3, og_title = ?4, og_image = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                content.title,
                content.body_md,
                content.og_url,
                content.og_title,
                content.og_image,
                now,
                id,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        search::upsert_index_on(&tx, id, &content.title, &content.body_md)?;
        tx.commit()?;

        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a post.  The index entry is removed explicitly (virtual tables
    /// have no foreign keys); comments, likes, and view records go with the
    /// post via `ON DELETE CASCADE`.
    pub fn delete_post(&mut self, id: i64) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        search::delete_index_on(&tx, id)?;
        let affected = tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        Ok(())
    }
}

/// Map a joined `rusqlite::Row` to a [`PostRecord`].
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRecord> {
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;

    Ok(PostRecord {
        post: Post {
            id: row.get(0)?,
            board_id: row.get(1)?,
            author_id: row.get(2)?,
            title: row.get(3)?,
            body_md: row.get(4)?,
            og_url: row.get(5)?,
            og_title: row.get(6)?,
            og_image: row.get(7)?,
            like_count: row.get(8)?,
            view_count: row.get(9)?,
            created_at: parse_ts(10, &created_str)?,
            updated_at: parse_ts(11, &updated_str)?,
        },
        author: Author {
            id: row.get(2)?,
            nickname: row.get(12)?,
            is_admin: row.get(13)?,
        },
        board_slug: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(db: &Database) -> (i64, i64) {
        let user = db.create_user("alice", "hash", false).unwrap();
        let board = db.create_board("General", "", "general").unwrap();
        (board.id, user.id)
    }

    fn content(title: &str, body: &str) -> PostContent {
        PostContent {
            title: title.to_string(),
            body_md: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn create_fetch_delete_round_trip() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);

        let record = db
            .create_post(board_id, user_id, &content("Hello", "First post"))
            .unwrap();
        assert_eq!(record.board_slug, "general");
        assert_eq!(record.author.nickname, "alice");

        db.delete_post(record.post.id).unwrap();
        match db.get_post(record.post.id) {
            Err(StoreError::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn posts_of_deleted_boards_are_missing() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);
        let record = db
            .create_post(board_id, user_id, &content("Hello", "body"))
            .unwrap();

        db.soft_delete_board(board_id).unwrap();
        assert!(matches!(
            db.get_post(record.post.id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);
        let record = db
            .create_post(board_id, user_id, &content("Hello", "body"))
            .unwrap();
        let post_id = record.post.id;

        db.create_comment(post_id, user_id, None, "a comment").unwrap();
        db.toggle_like(post_id, user_id).unwrap();
        db.record_view(post_id, "ip:10.0.0.1").unwrap();

        db.delete_post(post_id).unwrap();

        let count = |table: &str| -> i64 {
            db.conn()
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count("comments"), 0);
        assert_eq!(count("likes"), 0);
        assert_eq!(count("post_views"), 0);
    }

    #[test]
    fn listing_sorts_with_recency_tie_break() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);

        let a = db.create_post(board_id, user_id, &content("a", "x")).unwrap();
        let b = db.create_post(board_id, user_id, &content("b", "x")).unwrap();
        let c = db.create_post(board_id, user_id, &content("c", "x")).unwrap();

        // Give a and c the same like count; c is newer and must come first.
        for id in [a.post.id, c.post.id] {
            db.conn()
                .execute("UPDATE posts SET like_count = 5 WHERE id = ?1", params![id])
                .unwrap();
        }

        let latest = db.list_posts(board_id, PostSort::Latest, 10, 0).unwrap();
        let ids: Vec<i64> = latest.iter().map(|r| r.post.id).collect();
        assert_eq!(ids, vec![c.post.id, b.post.id, a.post.id]);

        let liked = db.list_posts(board_id, PostSort::Likes, 10, 0).unwrap();
        let ids: Vec<i64> = liked.iter().map(|r| r.post.id).collect();
        assert_eq!(ids, vec![c.post.id, a.post.id, b.post.id]);
    }

    #[test]
    fn listing_respects_limit_and_offset() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);
        for i in 0..5 {
            db.create_post(board_id, user_id, &content(&format!("t{i}"), "x"))
                .unwrap();
        }

        let page = db.list_posts(board_id, PostSort::Latest, 2, 2).unwrap();
        assert_eq!(page.len(), 2);
        let rest = db.list_posts(board_id, PostSort::Latest, 10, 4).unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn batched_like_membership() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);
        let a = db.create_post(board_id, user_id, &content("a", "x")).unwrap();
        let b = db.create_post(board_id, user_id, &content("b", "x")).unwrap();

        db.toggle_like(a.post.id, user_id).unwrap();

        let liked = db
            .liked_post_ids(user_id, &[a.post.id, b.post.id])
            .unwrap();
        assert!(liked.contains(&a.post.id));
        assert!(!liked.contains(&b.post.id));
        assert!(db.liked_post_ids(user_id, &[]).unwrap().is_empty());
    }

    #[test]
    fn fetch_by_ids_preserves_requested_order() {
        let mut db = Database::open_in_memory().unwrap();
        let (board_id, user_id) = fixture(&db);
        let a = db.create_post(board_id, user_id, &content("a", "x")).unwrap();
        let b = db.create_post(board_id, user_id, &content("b", "x")).unwrap();

        let records = db.get_posts_by_ids(&[b.post.id, a.post.id, 9999]).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.post.id).collect();
        assert_eq!(ids, vec![b.post.id, a.post.id]);
    }
}
