//! Post listing and CRUD endpoints.
//!
//! The heart of this module is [`assemble_feed`]: one entry point that picks
//! the search or browse path, applies limit+1 pagination, and annotates each
//! returned post with whether the requesting viewer has liked it (a single
//! batched membership query, never one lookup per post).

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use lightboard_store::{
    Author, Board, Database, LikeToggle, PostContent, PostRecord, PostSort, User,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::auth::{bearer_credential, require_user, resolve_user};
use crate::error::ApiError;
use crate::og::{extract_first_url, fetch_og};
use crate::rate_limit::{extract_client_ip, limiter_key};

/// Excerpt length for non-search listing items, in characters.
const EXCERPT_LEN: usize = 140;

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: i64,
    pub board_slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_md: String,
    pub like_count: i64,
    pub view_count: i64,
    pub liked_by_me: bool,
    pub og_url: Option<String>,
    pub og_title: Option<String>,
    pub og_image: Option<String>,
    /// Highlighted match excerpt; present only for full-text search hits.
    pub search_snippet: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Author,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub id: i64,
    pub board_slug: String,
    pub title: String,
    pub body_md: String,
    pub like_count: i64,
    pub view_count: i64,
    pub liked_by_me: bool,
    pub og_url: Option<String>,
    pub og_title: Option<String>,
    pub og_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Author,
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub items: Vec<PostListItem>,
    pub has_more: bool,
    pub next_offset: Option<i64>,
}

fn list_item(record: PostRecord, liked: bool, snippet: Option<String>) -> PostListItem {
    PostListItem {
        id: record.post.id,
        board_slug: record.board_slug,
        title: record.post.title,
        excerpt: make_excerpt(&record.post.body_md),
        body_md: record.post.body_md,
        like_count: record.post.like_count,
        view_count: record.post.view_count,
        liked_by_me: liked,
        og_url: record.post.og_url,
        og_title: record.post.og_title,
        og_image: record.post.og_image,
        search_snippet: snippet,
        created_at: record.post.created_at,
        updated_at: record.post.updated_at,
        author: record.author,
    }
}

fn detail(record: PostRecord, liked: bool) -> PostDetail {
    PostDetail {
        id: record.post.id,
        board_slug: record.board_slug,
        title: record.post.title,
        body_md: record.post.body_md,
        like_count: record.post.like_count,
        view_count: record.post.view_count,
        liked_by_me: liked,
        og_url: record.post.og_url,
        og_title: record.post.og_title,
        og_image: record.post.og_image,
        created_at: record.post.created_at,
        updated_at: record.post.updated_at,
        author: record.author,
    }
}

// ---------------------------------------------------------------------------
// Feed assembly
// ---------------------------------------------------------------------------

/// Fixed-length plain-text preview of a post body: newlines collapsed to
/// spaces, truncated with an ellipsis when over [`EXCERPT_LEN`] characters.
fn make_excerpt(body_md: &str) -> String {
    let plain = body_md.replace('\n', " ");
    let plain = plain.trim();
    let mut excerpt: String = plain.chars().take(EXCERPT_LEN).collect();
    if plain.chars().count() > EXCERPT_LEN {
        excerpt.push('…');
    }
    excerpt
}

fn parse_sort(sort: Option<&str>) -> Result<PostSort, ApiError> {
    match sort {
        None | Some("latest") => Ok(PostSort::Latest),
        Some("likes") => Ok(PostSort::Likes),
        Some("views") => Ok(PostSort::Views),
        Some(other) => Err(ApiError::BadRequest(format!("Unknown sort: {other}"))),
    }
}

/// Clamp offset/limit to their allowed ranges (offset >= 0, 1 <= limit <= 20,
/// default page size 10).
fn clamp_paging(offset: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (offset.unwrap_or(0).max(0), limit.unwrap_or(10).clamp(1, 20))
}

/// Produce one listing page for `board`.
///
/// With a query the search index decides membership and order (`sort` is
/// ignored -- ranking dominates); without one the requested sort drives a
/// plain scan.  Either path fetches `limit + 1` rows to learn whether more
/// pages remain without a separate count query.
pub fn assemble_feed(
    db: &Database,
    board: &Board,
    sort: PostSort,
    query: Option<&str>,
    offset: i64,
    limit: i64,
    viewer: Option<&User>,
) -> Result<PostPage, ApiError> {
    if let Some(q) = query {
        let mut hits = db.search_posts(board.id, q, limit + 1, offset)?;
        let has_more = hits.len() as i64 > limit;
        if has_more {
            hits.truncate(limit as usize);
        }

        let ids: Vec<i64> = hits.iter().map(|hit| hit.post_id).collect();
        let snippets: HashMap<i64, String> = hits
            .into_iter()
            .filter_map(|hit| hit.snippet.map(|snippet| (hit.post_id, snippet)))
            .collect();

        let records = db.get_posts_by_ids(&ids)?;
        return finish_page(db, records, snippets, has_more, offset, viewer);
    }

    let mut records = db.list_posts(board.id, sort, limit + 1, offset)?;
    let has_more = records.len() as i64 > limit;
    if has_more {
        records.truncate(limit as usize);
    }
    finish_page(db, records, HashMap::new(), has_more, offset, viewer)
}

fn finish_page(
    db: &Database,
    records: Vec<PostRecord>,
    snippets: HashMap<i64, String>,
    has_more: bool,
    offset: i64,
    viewer: Option<&User>,
) -> Result<PostPage, ApiError> {
    let ids: Vec<i64> = records.iter().map(|r| r.post.id).collect();
    let liked = match viewer {
        Some(user) => db.liked_post_ids(user.id, &ids)?,
        None => Default::default(),
    };

    let items: Vec<PostListItem> = records
        .into_iter()
        .map(|record| {
            let id = record.post.id;
            list_item(record, liked.contains(&id), snippets.get(&id).cloned())
        })
        .collect();

    let next_offset = has_more.then(|| offset + items.len() as i64);
    Ok(PostPage {
        items,
        has_more,
        next_offset,
    })
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub q: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PostBody {
    pub title: String,
    pub body_md: String,
}

fn validate_post_body(payload: &PostBody) -> Result<(String, String), ApiError> {
    let title = payload.title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(ApiError::BadRequest("Title must be 1-200 characters".into()));
    }
    let body = payload.body_md.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Body must not be empty".into()));
    }
    Ok((title.to_string(), body.to_string()))
}

/// GET /boards/{slug}/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Path(board_slug): Path<String>,
    Query(params): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<PostPage>, ApiError> {
    let sort = parse_sort(params.sort.as_deref())?;
    let (offset, limit) = clamp_paging(params.offset, params.limit);
    let query = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let db = state.db.lock().await;
    let board = db
        .get_board_by_slug(&board_slug)
        .map_err(|e| ApiError::from_store(e, "Board not found"))?;
    let viewer = resolve_user(&db, &headers, &state.config.jwt_secret);

    let page = assemble_feed(&db, &board, sort, query, offset, limit, viewer.as_ref())?;
    Ok(Json(page))
}

/// POST /boards/{slug}/posts
pub async fn create_post(
    State(state): State<AppState>,
    Path(board_slug): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<PostBody>,
) -> Result<Json<PostDetail>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let key = limiter_key("post-create", ip, bearer_credential(&headers));
    if !state.limiter.check(&key, state.config.post_budget).await {
        return Err(ApiError::RateLimited);
    }

    let (title, body_md) = validate_post_body(&payload)?;

    let (author_id, board_id) = {
        let db = state.db.lock().await;
        let user = require_user(&db, &headers, &state.config.jwt_secret)?;
        let board = db
            .get_board_by_slug(&board_slug)
            .map_err(|e| ApiError::from_store(e, "Board not found"))?;
        (user.id, board.id)
    };

    // The preview fetch happens outside the store lock; it can take seconds.
    let preview = match extract_first_url(&body_md) {
        Some(url) => fetch_og(&state.http, url).await,
        None => Default::default(),
    };

    let content = PostContent {
        title,
        body_md,
        og_url: preview.url,
        og_title: preview.title,
        og_image: preview.image,
    };

    let mut db = state.db.lock().await;
    let record = db.create_post(board_id, author_id, &content)?;
    tracing::info!(post_id = record.post.id, board = %board_slug, "post created");
    Ok(Json(detail(record, false)))
}

/// GET /posts/{id}
///
/// Also records a view for the caller's viewer key; repeat views by the same
/// viewer leave the counter unchanged.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<PostDetail>, ApiError> {
    let mut db = state.db.lock().await;

    // Resolve first so posts of deleted boards 404 before any counting.
    db.get_post(post_id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;

    let viewer = resolve_user(&db, &headers, &state.config.jwt_secret);
    let viewer_key = match &viewer {
        Some(user) => format!("user:{}", user.id),
        None => format!("ip:{}", extract_client_ip(&headers, peer)),
    };
    db.record_view(post_id, &viewer_key)?;

    let record = db
        .get_post(post_id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;
    let liked = match &viewer {
        Some(user) => db.liked_post_ids(user.id, &[post_id])?.contains(&post_id),
        None => false,
    };
    Ok(Json(detail(record, liked)))
}

/// PUT /posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<PostBody>,
) -> Result<Json<PostDetail>, ApiError> {
    let (title, body_md) = validate_post_body(&payload)?;

    let user = {
        let db = state.db.lock().await;
        let user = require_user(&db, &headers, &state.config.jwt_secret)?;
        let record = db
            .get_post(post_id)
            .map_err(|e| ApiError::from_store(e, "Post not found"))?;
        if record.post.author_id != user.id {
            return Err(ApiError::Forbidden("You can only edit your own posts".into()));
        }
        user
    };

    let preview = match extract_first_url(&body_md) {
        Some(url) => fetch_og(&state.http, url).await,
        None => Default::default(),
    };

    let content = PostContent {
        title,
        body_md,
        og_url: preview.url,
        og_title: preview.title,
        og_image: preview.image,
    };

    let mut db = state.db.lock().await;
    let record = db.update_post(post_id, &content)?;
    let liked = db.liked_post_ids(user.id, &[post_id])?.contains(&post_id);
    Ok(Json(detail(record, liked)))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    let record = db
        .get_post(post_id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;
    if record.post.author_id != user.id {
        return Err(ApiError::Forbidden("You can only delete your own posts".into()));
    }

    db.delete_post(post_id)?;
    tracing::info!(post_id, "post deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /posts/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<LikeToggle>, ApiError> {
    let ip = extract_client_ip(&headers, peer);
    let key = limiter_key("like", ip, bearer_credential(&headers));
    if !state.limiter.check(&key, state.config.like_budget).await {
        return Err(ApiError::RateLimited);
    }

    let mut db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    let toggle = db
        .toggle_like(post_id, user.id)
        .map_err(|e| ApiError::from_store(e, "Post not found"))?;
    Ok(Json(toggle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(db: &Database) -> (Board, User) {
        let user = db.create_user("alice", "hash", false).unwrap();
        let board = db.create_board("General", "", "general").unwrap();
        (board, user)
    }

    fn seed_posts(db: &mut Database, board_id: i64, author_id: i64, n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| {
                db.create_post(
                    board_id,
                    author_id,
                    &PostContent {
                        title: format!("Post {i}"),
                        body_md: format!("body of post {i}"),
                        ..Default::default()
                    },
                )
                .unwrap()
                .post
                .id
            })
            .collect()
    }

    #[test]
    fn excerpt_collapses_newlines_and_truncates() {
        assert_eq!(make_excerpt("line one\nline two"), "line one line two");

        let long = "x".repeat(200);
        let excerpt = make_excerpt(&long);
        assert_eq!(excerpt.chars().count(), EXCERPT_LEN + 1);
        assert!(excerpt.ends_with('…'));

        let exact = "y".repeat(EXCERPT_LEN);
        assert_eq!(make_excerpt(&exact), exact);
    }

    #[test]
    fn sort_and_paging_parsing() {
        assert_eq!(parse_sort(None).unwrap(), PostSort::Latest);
        assert_eq!(parse_sort(Some("likes")).unwrap(), PostSort::Likes);
        assert!(parse_sort(Some("oldest")).is_err());

        assert_eq!(clamp_paging(None, None), (0, 10));
        assert_eq!(clamp_paging(Some(-5), Some(100)), (0, 20));
        assert_eq!(clamp_paging(Some(30), Some(0)), (30, 1));
    }

    #[test]
    fn pagination_detects_further_pages() {
        let mut db = Database::open_in_memory().unwrap();
        let (board, user) = fixture(&db);
        seed_posts(&mut db, board.id, user.id, 11);

        let page = assemble_feed(&db, &board, PostSort::Latest, None, 0, 10, None).unwrap();
        assert_eq!(page.items.len(), 10);
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(10));

        let last = assemble_feed(&db, &board, PostSort::Latest, None, 10, 10, None).unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert_eq!(last.next_offset, None);
    }

    #[test]
    fn exactly_one_page_has_no_more() {
        let mut db = Database::open_in_memory().unwrap();
        let (board, user) = fixture(&db);
        seed_posts(&mut db, board.id, user.id, 10);

        let page = assemble_feed(&db, &board, PostSort::Latest, None, 0, 10, None).unwrap();
        assert_eq!(page.items.len(), 10);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn viewer_sees_their_likes_annotated() {
        let mut db = Database::open_in_memory().unwrap();
        let (board, user) = fixture(&db);
        let ids = seed_posts(&mut db, board.id, user.id, 3);
        db.toggle_like(ids[1], user.id).unwrap();

        let page =
            assemble_feed(&db, &board, PostSort::Latest, None, 0, 10, Some(&user)).unwrap();
        let liked: Vec<bool> = page.items.iter().map(|i| i.liked_by_me).collect();
        // Latest-first order: ids[2], ids[1], ids[0].
        assert_eq!(liked, vec![false, true, false]);

        let anonymous = assemble_feed(&db, &board, PostSort::Latest, None, 0, 10, None).unwrap();
        assert!(anonymous.items.iter().all(|i| !i.liked_by_me));
    }

    #[test]
    fn search_path_carries_snippets_and_fallback_does_not() {
        let mut db = Database::open_in_memory().unwrap();
        let (board, user) = fixture(&db);
        let record = db
            .create_post(
                board.id,
                user.id,
                &PostContent {
                    title: "Plain title".into(),
                    body_md: "a body mentioning kayaking only".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let page =
            assemble_feed(&db, &board, PostSort::Latest, Some("kayaking"), 0, 10, None).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, record.post.id);
        let snippet = page.items[0].search_snippet.as_deref().unwrap();
        assert!(snippet.contains("<mark>"));

        db.conn().execute_batch("DROP TABLE posts_fts").unwrap();

        let degraded =
            assemble_feed(&db, &board, PostSort::Latest, Some("kayaking"), 0, 10, None).unwrap();
        assert_eq!(degraded.items.len(), 1);
        assert_eq!(degraded.items[0].id, record.post.id);
        assert!(degraded.items[0].search_snippet.is_none());
    }

    #[test]
    fn search_pagination_has_more() {
        let mut db = Database::open_in_memory().unwrap();
        let (board, user) = fixture(&db);
        seed_posts(&mut db, board.id, user.id, 5);

        let page =
            assemble_feed(&db, &board, PostSort::Latest, Some("body"), 0, 3, None).unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(3));
    }
}
