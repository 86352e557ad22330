//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    /// Unique display name used for login.
    pub nickname: String,
    /// Argon2 password hash.  Never serialized into API payloads.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Whether the user may manage boards.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a [`User`] embedded in post and comment payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub nickname: String,
    pub is_admin: bool,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname.clone(),
            is_admin: user.is_admin,
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A named container scoping posts (like a sub-forum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// URL slug, unique across boards.  Lowercase `[a-z0-9-]`.
    pub slug: String,
    /// Soft delete flag.  Deleted boards are hidden from all public paths.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A titled, authored piece of markdown content within a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub board_id: i64,
    pub author_id: i64,
    pub title: String,
    pub body_md: String,
    /// Link preview extracted from the first URL in the body, if any.
    pub og_url: Option<String>,
    pub og_title: Option<String>,
    pub og_image: Option<String>,
    /// Cached mirror of `COUNT(likes)` for this post.
    pub like_count: i64,
    /// Cached mirror of `COUNT(post_views)` for this post.
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post joined with its author and owning board slug, as the listing and
/// detail paths need it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRecord {
    pub post: Post,
    pub author: Author,
    pub board_slug: String,
}

/// Sort order for the browse (non-search) listing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    /// Creation time descending.
    Latest,
    /// Like count descending, then creation time descending.
    Likes,
    /// View count descending, then creation time descending.
    Views,
}

/// Field set for creating or replacing a post's content.
#[derive(Debug, Clone, Default)]
pub struct PostContent {
    pub title: String,
    pub body_md: String,
    pub og_url: Option<String>,
    pub og_title: Option<String>,
    pub og_image: Option<String>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A reply to a post, optionally nested under another comment of the same
/// post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    /// `None` for root comments.  When present, always a comment id of the
    /// same post.
    pub parent_id: Option<i64>,
    pub body_md: String,
    /// Soft delete flag.  Deleted comments keep their row so descendants stay
    /// attached; the body is replaced by a placeholder.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment joined with its author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: Author,
}
