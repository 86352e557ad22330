//! Shared row-mapping helpers for the CRUD modules.

use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Parse an RFC-3339 TEXT column into a `DateTime<Utc>`, mapping failures to
/// a `rusqlite` conversion error for the given column index.
pub(crate) fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a unique-constraint violation to [`StoreError::Conflict`], passing
/// every other error through unchanged.
pub(crate) fn map_unique(err: rusqlite::Error, what: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Sqlite(err),
    }
}
