//! Router assembly and shared application state.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use lightboard_store::Database;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::{auth, boards, comments, og, posts};

/// State shared by every handler.
///
/// The store is a single synchronous SQLite connection behind an async
/// mutex; handlers hold the lock only across their own queries, never across
/// outbound network calls.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub limiter: RateLimiter,
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/boards", get(boards::list_boards))
        .route(
            "/boards/{slug}/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/admin/boards",
            get(boards::admin_list_boards).post(boards::admin_create_board),
        )
        .route(
            "/admin/boards/{id}",
            patch(boards::admin_update_board).delete(boards::admin_delete_board),
        )
        .route("/utils/og-preview", get(og::og_preview))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %config.cors_origin, "Invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}

/// Conservative security headers on every response.
async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; img-src 'self' https: data:; style-src 'self' 'unsafe-inline'; script-src 'self'",
        ),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
