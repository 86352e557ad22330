//! v002 -- Full-text search index.
//!
//! Creates the `posts_fts` FTS5 virtual table that shadows the `posts` table.
//! The rowid of each index entry equals the post id, which lets queries join
//! back to `posts` and lets the upsert path replace an entry by rowid.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
///
/// May fail on SQLite builds without FTS5; the migration runner treats that
/// as non-fatal and search falls back to a substring scan.
const UP_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS posts_fts USING fts5(
    post_id UNINDEXED,
    title,
    body
);
"#;

/// Apply the search-index migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
