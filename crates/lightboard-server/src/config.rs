//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// A rate budget: at most `limit` admitted events per key per rolling
/// `window`.  Parsed from `"count/window_secs"` strings (e.g. `"20/60"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub limit: usize,
    pub window: Duration,
}

impl RateBudget {
    pub const fn new(limit: usize, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Parse `"count/window_secs"`.
    fn parse(value: &str) -> Result<Self, String> {
        let (limit, window) = value
            .split_once('/')
            .ok_or_else(|| format!("expected count/window_secs, got {value:?}"))?;
        let limit: usize = limit
            .trim()
            .parse()
            .map_err(|_| format!("invalid count in {value:?}"))?;
        let window_secs: u64 = window
            .trim()
            .parse()
            .map_err(|_| format!("invalid window in {value:?}"))?;
        if limit == 0 || window_secs == 0 {
            return Err(format!("count and window must be positive, got {value:?}"));
        }
        Ok(Self::new(limit, window_secs))
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// Explicit path for the SQLite database file.
    /// Env: `DB_PATH`
    /// Default: none (the store picks the platform data directory).
    pub db_path: Option<PathBuf>,

    /// HMAC secret for signing access tokens.
    /// Env: `JWT_SECRET`
    /// Default: `"dev-secret-change-me"` (development only).
    pub jwt_secret: String,

    /// Access token lifetime in hours.
    /// Env: `TOKEN_TTL_HOURS`
    /// Default: `168` (one week).
    pub token_ttl_hours: i64,

    /// Origin allowed by CORS.
    /// Env: `CORS_ORIGIN`
    /// Default: `http://localhost:5173` (the dev frontend).
    pub cors_origin: String,

    /// Whether first-run demo data is seeded into an empty database.
    /// Env: `SEED_DEMO_DATA` (true/false)
    /// Default: `true`
    pub seed_demo_data: bool,

    /// Timeout for outbound link-preview fetches, in seconds.
    /// Env: `OG_TIMEOUT_SECS`
    /// Default: `6`
    pub og_timeout_secs: u64,

    // -- Per-action rate budgets ("count/window_secs") --

    /// Budget for post creation.
    /// Env: `RATE_LIMIT_POST`
    /// Default: `20/60`
    pub post_budget: RateBudget,

    /// Budget for comment creation.
    /// Env: `RATE_LIMIT_COMMENT`
    /// Default: `30/60`
    pub comment_budget: RateBudget,

    /// Budget for like toggling.
    /// Env: `RATE_LIMIT_LIKE`
    /// Default: `20/60`
    pub like_budget: RateBudget,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8000).into(),
            db_path: None,
            jwt_secret: "dev-secret-change-me".to_string(),
            token_ttl_hours: 168,
            cors_origin: "http://localhost:5173".to_string(),
            seed_demo_data: true,
            og_timeout_secs: 6,
            post_budget: RateBudget::new(20, 60),
            comment_budget: RateBudget::new(30, 60),
            like_budget: RateBudget::new(20, 60),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        }

        if let Ok(val) = std::env::var("TOKEN_TTL_HOURS") {
            if let Ok(hours) = val.parse::<i64>() {
                config.token_ttl_hours = hours;
            } else {
                tracing::warn!(value = %val, "Invalid TOKEN_TTL_HOURS, using default");
            }
        }

        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            config.cors_origin = origin;
        }

        if let Ok(val) = std::env::var("SEED_DEMO_DATA") {
            config.seed_demo_data = val != "false" && val != "0";
        }

        if let Ok(val) = std::env::var("OG_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.og_timeout_secs = secs;
            } else {
                tracing::warn!(value = %val, "Invalid OG_TIMEOUT_SECS, using default");
            }
        }

        for (var, slot) in [
            ("RATE_LIMIT_POST", &mut config.post_budget),
            ("RATE_LIMIT_COMMENT", &mut config.comment_budget),
            ("RATE_LIMIT_LIKE", &mut config.like_budget),
        ] {
            if let Ok(val) = std::env::var(var) {
                match RateBudget::parse(&val) {
                    Ok(budget) => *slot = budget,
                    Err(e) => tracing::warn!(var, error = %e, "Invalid rate budget, using default"),
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.comment_budget, RateBudget::new(30, 60));
        assert!(config.seed_demo_data);
    }

    #[test]
    fn test_parse_rate_budget() {
        let budget = RateBudget::parse("15/30").unwrap();
        assert_eq!(budget.limit, 15);
        assert_eq!(budget.window, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_rate_budget_rejects_garbage() {
        assert!(RateBudget::parse("15").is_err());
        assert!(RateBudget::parse("a/b").is_err());
        assert!(RateBudget::parse("0/60").is_err());
    }
}
