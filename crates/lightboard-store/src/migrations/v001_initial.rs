//! v001 -- Initial schema creation.
//!
//! Creates the six core tables: `users`, `boards`, `posts`, `comments`,
//! `likes`, and `post_views`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY,
    nickname      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    created_at    TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Boards
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS boards (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    slug        TEXT NOT NULL UNIQUE,
    is_deleted  INTEGER NOT NULL DEFAULT 0,     -- soft delete flag
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         INTEGER PRIMARY KEY,
    board_id   INTEGER NOT NULL,
    author_id  INTEGER NOT NULL,
    title      TEXT NOT NULL,
    body_md    TEXT NOT NULL,
    og_url     TEXT,                            -- link preview, all nullable
    og_title   TEXT,
    og_image   TEXT,
    like_count INTEGER NOT NULL DEFAULT 0,      -- mirror of likes rows
    view_count INTEGER NOT NULL DEFAULT 0,      -- mirror of post_views rows
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (board_id)  REFERENCES boards(id),
    FOREIGN KEY (author_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_posts_board_created
    ON posts(board_id, created_at DESC);

-- ----------------------------------------------------------------
-- Comments (self-referential: parent_id forms a tree per post)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         INTEGER PRIMARY KEY,
    post_id    INTEGER NOT NULL,
    author_id  INTEGER NOT NULL,
    parent_id  INTEGER,                         -- NULL = root comment
    body_md    TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (post_id)   REFERENCES posts(id)    ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES users(id),
    FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post_created
    ON comments(post_id, created_at ASC);

-- ----------------------------------------------------------------
-- Likes (one row per (post, user) pair; source of truth for like_count)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS likes (
    id         INTEGER PRIMARY KEY,
    post_id    INTEGER NOT NULL,
    user_id    INTEGER NOT NULL,
    created_at TEXT NOT NULL,

    UNIQUE (post_id, user_id),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Post views (one row per (post, viewer_key); dedupes view_count)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS post_views (
    id         INTEGER PRIMARY KEY,
    post_id    INTEGER NOT NULL,
    viewer_key TEXT NOT NULL,                   -- "user:{id}" or "ip:{addr}"
    created_at TEXT NOT NULL,

    UNIQUE (post_id, viewer_key),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
