//! # lightboard-server
//!
//! HTTP backend for the Lightboard discussion board.
//!
//! This binary provides:
//! - **REST API** (axum) for boards, posts, threaded comments, likes, and
//!   deduplicated view counts
//! - **Full-text post search** backed by SQLite FTS5, degrading to a
//!   substring scan when the index is unavailable
//! - **Sliding-window rate limiting** on the write endpoints
//! - **Bearer-token auth** (argon2 password hashes, HS256 access tokens)
//! - **Best-effort link previews** for the first URL in a post body

mod api;
mod auth;
mod boards;
mod comments;
mod config;
mod error;
mod og;
mod posts;
mod rate_limit;
mod seed;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lightboard_store::Database;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lightboard_server=debug")),
        )
        .init();

    info!("Starting Lightboard server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config.http_addr, seed = config.seed_demo_data, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Database::open_at(path)?
        }
        None => Database::new()?,
    };

    // -----------------------------------------------------------------------
    // 4. Assemble application state
    // -----------------------------------------------------------------------
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.og_timeout_secs))
        .user_agent(concat!("lightboard/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let rate_limiter = RateLimiter::new();

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        limiter: rate_limiter.clone(),
        http,
        config: Arc::new(config.clone()),
    };

    if config.seed_demo_data {
        seed::seed_demo_data(&state).await?;
    }

    // -----------------------------------------------------------------------
    // 5. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(Duration::from_secs(600)).await;
        }
    });

    // -----------------------------------------------------------------------
    // 6. Serve
    // -----------------------------------------------------------------------
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP API listening");

    axum::serve(
        listener,
        api::build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
