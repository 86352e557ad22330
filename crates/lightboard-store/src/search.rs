//! Full-text search over posts, with graceful degradation.
//!
//! Two strategies sit behind one `search_posts` contract:
//!
//! - **FullText** -- the `posts_fts` FTS5 table, ranked by `bm25` with a
//!   highlighted excerpt per hit.
//! - **Substring** -- a plain `LIKE` containment scan over title and body,
//!   ordered by recency, no excerpt.
//!
//! The strategy is chosen per call by probing for the FTS table, so a build
//! of SQLite without FTS5 (or a failed v002 migration) degrades silently.
//! A `MATCH` error at query time -- FTS5 rejects some raw user input as
//! malformed query syntax -- takes the same fallback path; callers never see
//! a search error, only results of a different confidence characteristic.

use rusqlite::{params, Connection};

use crate::database::Database;
use crate::error::Result;

/// One search result: a post id plus, on the full-text path, a highlighted
/// excerpt around the match.  `snippet` is `None` for fallback results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub post_id: i64,
    pub snippet: Option<String>,
}

/// The strategy serving a particular search call.
enum SearchStrategy {
    FullText,
    Substring,
}

impl Database {
    /// Whether the FTS5 index table exists in this database.
    pub fn fts_available(&self) -> bool {
        fts_available_on(self.conn())
    }

    /// Ranked search over one board's posts.
    ///
    /// The caller owns pagination and passes `limit` directly (the feed layer
    /// asks for one row more than the page size to detect further pages).
    pub fn search_posts(
        &self,
        board_id: i64,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchHit>> {
        let strategy = if self.fts_available() {
            SearchStrategy::FullText
        } else {
            SearchStrategy::Substring
        };

        match strategy {
            SearchStrategy::FullText => {
                match self.search_full_text(board_id, query, limit, offset) {
                    Ok(hits) => Ok(hits),
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            query,
                            "full-text query failed, retrying with substring scan"
                        );
                        self.search_substring(board_id, query, limit, offset)
                    }
                }
            }
            SearchStrategy::Substring => self.search_substring(board_id, query, limit, offset),
        }
    }

    fn search_full_text(
        &self,
        board_id: i64,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id,
                    snippet(posts_fts, 2, '<mark>', '</mark>', '…', 18)
             FROM posts_fts
             JOIN posts p ON p.id = posts_fts.post_id
             WHERE p.board_id = ?1
               AND posts_fts MATCH ?2
             ORDER BY bm25(posts_fts), p.created_at DESC
             LIMIT ?3 OFFSET ?4",
        )?;

        let rows = stmt.query_map(params![board_id, query, limit, offset], |row| {
            Ok(SearchHit {
                post_id: row.get(0)?,
                snippet: Some(row.get(1)?),
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    fn search_substring(
        &self,
        board_id: i64,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SearchHit>> {
        let pattern = format!("%{query}%");
        let mut stmt = self.conn().prepare(
            "SELECT p.id
             FROM posts p
             WHERE p.board_id = ?1
               AND (p.title LIKE ?2 OR p.body_md LIKE ?2)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;

        let rows = stmt.query_map(params![board_id, pattern, limit, offset], |row| {
            Ok(SearchHit {
                post_id: row.get(0)?,
                snippet: None,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Index maintenance (called from the post write transactions in `posts.rs`)
// ---------------------------------------------------------------------------

/// Whether the `posts_fts` table exists on this connection.
pub(crate) fn fts_available_on(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'posts_fts'",
        [],
        |_| Ok(()),
    )
    .is_ok()
}

/// Replace a post's index entry (delete-then-insert; the FTS rowid mirrors
/// the post id).  A no-op when the index table is absent.
pub(crate) fn upsert_index_on(
    conn: &Connection,
    post_id: i64,
    title: &str,
    body: &str,
) -> rusqlite::Result<()> {
    if !fts_available_on(conn) {
        return Ok(());
    }
    conn.execute("DELETE FROM posts_fts WHERE rowid = ?1", params![post_id])?;
    conn.execute(
        "INSERT INTO posts_fts(rowid, post_id, title, body) VALUES (?1, ?1, ?2, ?3)",
        params![post_id, title, body],
    )?;
    Ok(())
}

/// Remove a post's index entry.  A no-op when the index table is absent.
pub(crate) fn delete_index_on(conn: &Connection, post_id: i64) -> rusqlite::Result<()> {
    if !fts_available_on(conn) {
        return Ok(());
    }
    conn.execute("DELETE FROM posts_fts WHERE rowid = ?1", params![post_id])?;
    Ok(())
}
