//! # lightboard-store
//!
//! SQLite persistence layer for the Lightboard discussion-board backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus the two transactional core components:
//!
//! - the **search index** (`search`): FTS5-backed ranked search over post
//!   title + body with a substring fallback when FTS5 is unavailable
//! - the **interaction counters** (`interactions`): deduplicated view
//!   recording and idempotent like toggling, each in a single transaction

pub mod boards;
pub mod comments;
pub mod database;
pub mod interactions;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod search;
pub mod users;

mod error;
mod rows;

pub use comments::DELETED_BODY;
pub use database::Database;
pub use error::{Result, StoreError};
pub use interactions::LikeToggle;
pub use models::*;
pub use search::SearchHit;
