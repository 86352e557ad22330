//! Comment endpoints and the comment tree builder.
//!
//! The store hands back a flat list ordered ascending by creation time; the
//! builder groups it by parent id (preserving that order, which already
//! encodes the tie-break) and materializes the forest depth-first.  Nothing
//! here re-sorts: a group's order is its creation order.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use lightboard_store::{Author, CommentRecord, DELETED_BODY};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::{bearer_credential, require_user};
use crate::error::ApiError;
use crate::rate_limit::{extract_client_ip, limiter_key};

/// A comment with its replies, as the comment endpoints return it.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CommentNode {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub body_md: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Author,
    pub children: Vec<CommentNode>,
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

/// Convert a flat, creation-ordered comment list into a forest.
///
/// Soft-deleted comments surface the placeholder body but keep their node so
/// descendants stay attached.  A comment whose parent is not part of the
/// input set is dropped; the caller passes a consistent scope (all comments
/// of one post) and same-post parentage is enforced at creation time.
pub fn build_comment_tree(records: Vec<CommentRecord>) -> Vec<CommentNode> {
    let mut roots: Vec<CommentRecord> = Vec::new();
    let mut children: HashMap<i64, Vec<CommentRecord>> = HashMap::new();

    for record in records {
        match record.comment.parent_id {
            None => roots.push(record),
            Some(parent_id) => children.entry(parent_id).or_default().push(record),
        }
    }

    roots
        .into_iter()
        .map(|record| materialize(record, &mut children))
        .collect()
}

fn materialize(record: CommentRecord, children: &mut HashMap<i64, Vec<CommentRecord>>) -> CommentNode {
    let comment = record.comment;
    let child_records = children.remove(&comment.id).unwrap_or_default();

    CommentNode {
        id: comment.id,
        post_id: comment.post_id,
        parent_id: comment.parent_id,
        body_md: if comment.is_deleted {
            DELETED_BODY.to_string()
        } else {
            comment.body_md
        },
        is_deleted: comment.is_deleted,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        author: record.author,
        children: child_records
            .into_iter()
            .map(|child| materialize(child, children))
            .collect(),
    }
}

fn leaf(record: CommentRecord) -> CommentNode {
    materialize(record, &mut HashMap::new())
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CommentCreate {
    pub body_md: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentUpdate {
    pub body_md: String,
}

fn validate_body(body_md: &str) -> Result<&str, ApiError> {
    let body = body_md.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Body must not be empty".into()));
    }
    Ok(body)
}

/// GET /posts/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentNode>>, ApiError> {
    let db = state.db.lock().await;
    db.get_post(post_id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;

    let records = db.list_comments(post_id)?;
    Ok(Json(build_comment_tree(records)))
}

/// POST /posts/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CommentCreate>,
) -> Result<Json<CommentNode>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let key = limiter_key("comment-create", ip, bearer_credential(&headers));
    if !state.limiter.check(&key, state.config.comment_budget).await {
        return Err(ApiError::RateLimited);
    }

    let body = validate_body(&payload.body_md)?;

    let db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    db.get_post(post_id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;

    let record = db.create_comment(post_id, user.id, payload.parent_id, body)?;
    tracing::info!(comment_id = record.comment.id, post_id, "comment created");
    Ok(Json(leaf(record)))
}

/// PUT /comments/{id}
pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<CommentUpdate>,
) -> Result<Json<CommentNode>, ApiError> {
    let body = validate_body(&payload.body_md)?;

    let db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    let record = db
        .get_comment(comment_id)
        .map_err(|e| ApiError::from_store(e, "Comment not found"))?;
    if record.comment.author_id != user.id {
        return Err(ApiError::Forbidden("You can only edit your own comments".into()));
    }

    // Soft-deleted comments are no longer editable; the store reports them
    // as missing.
    let record = db
        .update_comment(comment_id, body)
        .map_err(|e| ApiError::from_store(e, "Comment not found"))?;
    Ok(Json(leaf(record)))
}

/// DELETE /comments/{id}
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    let record = db
        .get_comment(comment_id)
        .map_err(|e| ApiError::from_store(e, "Comment not found"))?;
    if record.comment.author_id != user.id {
        return Err(ApiError::Forbidden("You can only delete your own comments".into()));
    }

    db.soft_delete_comment(comment_id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lightboard_store::Comment;

    fn author() -> Author {
        Author {
            id: 1,
            nickname: "alice".into(),
            is_admin: false,
        }
    }

    fn record(id: i64, parent_id: Option<i64>, t: i64, is_deleted: bool) -> CommentRecord {
        let ts = Utc.timestamp_opt(t, 0).unwrap();
        CommentRecord {
            comment: Comment {
                id,
                post_id: 1,
                author_id: 1,
                parent_id,
                body_md: format!("comment {id}"),
                is_deleted,
                created_at: ts,
                updated_at: ts,
            },
            author: author(),
        }
    }

    #[test]
    fn forest_preserves_creation_order() {
        let records = vec![
            record(1, None, 1, false),
            record(2, Some(1), 2, false),
            record(3, None, 3, false),
            record(4, Some(1), 4, false),
        ];

        let forest = build_comment_tree(records);

        let root_ids: Vec<i64> = forest.iter().map(|n| n.id).collect();
        assert_eq!(root_ids, vec![1, 3]);

        let child_ids: Vec<i64> = forest[0].children.iter().map(|n| n.id).collect();
        assert_eq!(child_ids, vec![2, 4]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn deep_nesting_materializes_depth_first() {
        let records = vec![
            record(1, None, 1, false),
            record(2, Some(1), 2, false),
            record(3, Some(2), 3, false),
        ];

        let forest = build_comment_tree(records);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].children[0].id, 3);
    }

    #[test]
    fn deleted_nodes_mask_body_but_keep_children() {
        let records = vec![
            record(1, None, 1, true),
            record(2, Some(1), 2, false),
        ];

        let forest = build_comment_tree(records);
        assert_eq!(forest[0].body_md, DELETED_BODY);
        assert!(forest[0].is_deleted);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].body_md, "comment 2");
    }

    #[test]
    fn rows_with_absent_parents_are_dropped() {
        let records = vec![
            record(1, None, 1, false),
            record(5, Some(99), 2, false),
        ];

        let forest = build_comment_tree(records);
        let ids: Vec<i64> = forest.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_comment_tree(Vec::new()).is_empty());
    }
}
