//! Board listing and the admin board CRUD.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use lightboard_store::Board;
use serde::Deserialize;

use crate::api::AppState;
use crate::auth::require_admin;
use crate::error::ApiError;

/// A board slug: 2-80 characters of lowercase `[a-z0-9-]`.
fn validate_slug(slug: &str) -> Result<(), ApiError> {
    let ok = (2..=80).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !ok {
        return Err(ApiError::BadRequest(
            "Slug must be 2-80 characters of a-z, 0-9 or '-'".into(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::BadRequest("Name must be 1-100 characters".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public endpoint
// ---------------------------------------------------------------------------

/// GET /boards
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<Board>>, ApiError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_boards(false)?))
}

// ---------------------------------------------------------------------------
// Admin endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BoardCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct BoardUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
}

/// GET /admin/boards
pub async fn admin_list_boards(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Board>>, ApiError> {
    let db = state.db.lock().await;
    require_admin(&db, &headers, &state.config.jwt_secret)?;
    Ok(Json(db.list_boards(query.include_deleted.unwrap_or(true))?))
}

/// POST /admin/boards
pub async fn admin_create_board(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BoardCreate>,
) -> Result<Json<Board>, ApiError> {
    let name = payload.name.trim();
    let slug = payload.slug.trim().to_lowercase();
    validate_name(name)?;
    validate_slug(&slug)?;

    let db = state.db.lock().await;
    require_admin(&db, &headers, &state.config.jwt_secret)?;

    let board = db.create_board(name, payload.description.trim(), &slug)?;
    tracing::info!(board_id = board.id, slug = %board.slug, "board created");
    Ok(Json(board))
}

/// PATCH /admin/boards/{id}
pub async fn admin_update_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<BoardUpdate>,
) -> Result<Json<Board>, ApiError> {
    let name = payload.name.as_deref().map(str::trim);
    let description = payload.description.as_deref().map(str::trim);
    let slug = payload.slug.as_deref().map(|s| s.trim().to_lowercase());

    if let Some(name) = name {
        validate_name(name)?;
    }
    if let Some(slug) = &slug {
        validate_slug(slug)?;
    }

    let db = state.db.lock().await;
    require_admin(&db, &headers, &state.config.jwt_secret)?;

    let board = db
        .update_board(board_id, name, description, slug.as_deref())
        .map_err(|e| ApiError::from_store(e, "Board not found"))?;
    Ok(Json(board))
}

/// DELETE /admin/boards/{id} (soft delete)
pub async fn admin_delete_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let db = state.db.lock().await;
    require_admin(&db, &headers, &state.config.jwt_secret)?;

    db.soft_delete_board(board_id)
        .map_err(|e| ApiError::from_store(e, "Board not found"))?;
    tracing::info!(board_id, "board soft-deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(validate_slug("general").is_ok());
        assert!(validate_slug("q-and-a42").is_ok());
        assert!(validate_slug("x").is_err());
        assert!(validate_slug("General").is_err());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug(&"a".repeat(81)).is_err());
    }
}
