//! Identity: password hashing, bearer tokens, and the auth endpoints.
//!
//! The rest of the server treats this module as the "auth resolver": given
//! request headers it yields an optional authenticated [`User`].  Any token
//! problem (missing, malformed, expired, unknown user) resolves to anonymous
//! rather than an error; endpoints that need identity escalate via
//! [`require_user`].

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lightboard_store::{Author, Database, User};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id, stringified.
    sub: String,
    /// Expiry as a unix timestamp.
    exp: i64,
}

pub fn create_token(user_id: i64, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::hours(ttl_hours)).timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// Decode a token into the user id it names.  `None` on any defect.
fn decode_user_id(token: &str, secret: &str) -> Option<i64> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    data.claims.sub.parse().ok()
}

/// The raw bearer credential from the Authorization header, if present.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    value.strip_prefix("Bearer ").or(Some(value))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the caller to an authenticated user, or `None` for anonymous.
pub fn resolve_user(db: &Database, headers: &HeaderMap, secret: &str) -> Option<User> {
    let token = bearer_credential(headers)?;
    let user_id = decode_user_id(token, secret)?;
    db.get_user(user_id).ok()
}

/// Like [`resolve_user`], but anonymous callers are rejected.
pub fn require_user(db: &Database, headers: &HeaderMap, secret: &str) -> Result<User, ApiError> {
    resolve_user(db, headers, secret)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))
}

/// Admin gate on top of [`require_user`].
pub fn require_admin(db: &Database, headers: &HeaderMap, secret: &str) -> Result<User, ApiError> {
    let user = require_user(db, headers, secret)?;
    if !user.is_admin {
        return Err(ApiError::Forbidden("Admin privileges required".into()));
    }
    Ok(user)
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: Author,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let nickname = payload.nickname.trim();
    if nickname.chars().count() < 2 || nickname.chars().count() > 50 {
        return Err(ApiError::BadRequest("Nickname must be 2-50 characters".into()));
    }
    if payload.password.len() < 4 || payload.password.len() > 128 {
        return Err(ApiError::BadRequest("Password must be 4-128 characters".into()));
    }

    let password_hash = hash_password(&payload.password)?;

    let db = state.db.lock().await;
    let user = db.create_user(nickname, &password_hash, false)?;
    tracing::info!(user_id = user.id, nickname, "user registered");

    let token = create_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        user: Author::from(&user),
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let db = state.db.lock().await;
    let user = db
        .get_user_by_nickname(payload.nickname.trim())?
        .filter(|user| verify_password(&payload.password, &user.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("Invalid nickname or password".into()))?;

    let token = create_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        user: Author::from(&user),
    }))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Author>, ApiError> {
    let db = state.db.lock().await;
    let user = require_user(&db, &headers, &state.config.jwt_secret)?;
    Ok(Json(Author::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter42").unwrap();
        assert!(verify_password("hunter42", &hash));
        assert!(!verify_password("hunter43", &hash));
        assert!(!verify_password("hunter42", "not-a-hash"));
    }

    #[test]
    fn token_round_trip() {
        let token = create_token(7, "secret", 1).unwrap();
        assert_eq!(decode_user_id(&token, "secret"), Some(7));
        assert_eq!(decode_user_id(&token, "other-secret"), None);
        assert_eq!(decode_user_id("garbage", "secret"), None);
    }

    #[test]
    fn expired_token_is_anonymous() {
        // Expired well past the default validation leeway.
        let token = create_token(7, "secret", -2).unwrap();
        assert_eq!(decode_user_id(&token, "secret"), None);
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_credential(&headers), None);

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_credential(&headers), Some("abc123"));

        headers.insert("authorization", "abc123".parse().unwrap());
        assert_eq!(bearer_credential(&headers), Some("abc123"));
    }
}
