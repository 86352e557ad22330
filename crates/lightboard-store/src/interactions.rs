//! Interaction counters: deduplicated view recording and idempotent like
//! toggling.
//!
//! Both counters on `posts` (`view_count`, `like_count`) are cached mirrors
//! of their row tables (`post_views`, `likes`).  Every mutation here adjusts
//! the row table and the counter in one transaction, so the mirror cannot
//! drift from the source of truth at rest.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeToggle {
    /// Whether the user likes the post after the toggle.
    pub liked: bool,
    /// The post's like count after the toggle.
    pub like_count: i64,
}

impl Database {
    /// Record a view of `post_id` by `viewer_key`.
    ///
    /// The first view per (post, viewer) inserts a `post_views` row and
    /// increments `view_count`; repeat views hit the unique constraint and
    /// are silently skipped -- a repeat view is a no-op, never an error.
    ///
    /// Returns whether the counter was incremented.
    pub fn record_view(&mut self, post_id: i64, viewer_key: &str) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM posts WHERE id = ?1", params![post_id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO post_views (post_id, viewer_key, created_at)
             VALUES (?1, ?2, ?3)",
            params![post_id, viewer_key, Utc::now().to_rfc3339()],
        )?;

        if inserted == 1 {
            tx.execute(
                "UPDATE posts SET view_count = view_count + 1 WHERE id = ?1",
                params![post_id],
            )?;
        }

        tx.commit()?;
        Ok(inserted == 1)
    }

    /// Toggle the (post, user) like: delete the row and decrement when it
    /// exists, insert and increment when it does not.  The counter floors at
    /// zero.  Row mutation, counter adjustment, and the count readback share
    /// one transaction.
    pub fn toggle_like(&mut self, post_id: i64, user_id: i64) -> Result<LikeToggle> {
        let tx = self.conn_mut().transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        let liked = match existing {
            Some(like_id) => {
                tx.execute("DELETE FROM likes WHERE id = ?1", params![like_id])?;
                tx.execute(
                    "UPDATE posts
                     SET like_count = CASE WHEN like_count > 0 THEN like_count - 1 ELSE 0 END
                     WHERE id = ?1",
                    params![post_id],
                )?;
                false
            }
            None => {
                tx.execute(
                    "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post_id, user_id, Utc::now().to_rfc3339()],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(f, _)
                        if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        // Foreign key: the post vanished under us.
                        StoreError::NotFound
                    }
                    other => StoreError::Sqlite(other),
                })?;
                tx.execute(
                    "UPDATE posts SET like_count = like_count + 1 WHERE id = ?1",
                    params![post_id],
                )?;
                true
            }
        };

        let like_count: Option<i64> = tx
            .query_row(
                "SELECT like_count FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(like_count) = like_count else {
            return Err(StoreError::NotFound);
        };

        tx.commit()?;
        Ok(LikeToggle { liked, like_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostContent;

    fn fixture(db: &mut Database) -> (i64, i64) {
        let user = db.create_user("alice", "hash", false).unwrap();
        let board = db.create_board("General", "", "general").unwrap();
        let post = db
            .create_post(
                board.id,
                user.id,
                &PostContent {
                    title: "t".into(),
                    body_md: "b".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        (post.post.id, user.id)
    }

    fn view_count(db: &Database, post_id: i64) -> i64 {
        db.conn()
            .query_row("SELECT view_count FROM posts WHERE id = ?1", params![post_id], |r| {
                r.get(0)
            })
            .unwrap()
    }

    fn like_rows(db: &Database, post_id: i64) -> i64 {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
                params![post_id],
                |r| r.get(0),
            )
            .unwrap()
    }

    #[test]
    fn repeat_views_count_once() {
        let mut db = Database::open_in_memory().unwrap();
        let (post_id, _) = fixture(&mut db);

        assert!(db.record_view(post_id, "ip:10.0.0.1").unwrap());
        for _ in 0..4 {
            assert!(!db.record_view(post_id, "ip:10.0.0.1").unwrap());
        }
        assert_eq!(view_count(&db, post_id), 1);

        // A different viewer key still counts.
        assert!(db.record_view(post_id, "user:42").unwrap());
        assert_eq!(view_count(&db, post_id), 2);
    }

    #[test]
    fn view_of_missing_post_is_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        fixture(&mut db);
        assert!(matches!(
            db.record_view(9999, "ip:10.0.0.1"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn toggle_parity_and_counter_mirror() {
        let mut db = Database::open_in_memory().unwrap();
        let (post_id, user_id) = fixture(&mut db);

        let on = db.toggle_like(post_id, user_id).unwrap();
        assert_eq!(on, LikeToggle { liked: true, like_count: 1 });

        let off = db.toggle_like(post_id, user_id).unwrap();
        assert_eq!(off, LikeToggle { liked: false, like_count: 0 });

        // An odd number of toggles ends liked with exactly +1 over baseline;
        // the cached counter always equals the row count.
        for _ in 0..3 {
            db.toggle_like(post_id, user_id).unwrap();
        }
        let record = db.get_post(post_id).unwrap();
        assert_eq!(record.post.like_count, 1);
        assert_eq!(record.post.like_count, like_rows(&db, post_id));
    }

    #[test]
    fn unliking_never_goes_negative() {
        let mut db = Database::open_in_memory().unwrap();
        let (post_id, user_id) = fixture(&mut db);

        // Force a drifted counter: a like row exists but the counter is 0.
        db.toggle_like(post_id, user_id).unwrap();
        db.conn()
            .execute("UPDATE posts SET like_count = 0 WHERE id = ?1", params![post_id])
            .unwrap();

        let off = db.toggle_like(post_id, user_id).unwrap();
        assert_eq!(off, LikeToggle { liked: false, like_count: 0 });
    }

    #[test]
    fn toggle_on_missing_post_is_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let (_, user_id) = fixture(&mut db);
        assert!(matches!(
            db.toggle_like(9999, user_id),
            Err(StoreError::NotFound)
        ));
    }
}
