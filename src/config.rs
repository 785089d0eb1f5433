//! Configuration loader for the `aqi-healthflow` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). The resulting [`Config`] is built once in `main`
//! and injected into the router; nothing else reads the environment.
//!
use std::env;

use anyhow::{anyhow, Result};

use crate::pipeline::LagSource;

/// Default endpoint of the OpenWeather air-pollution API.
pub const DEFAULT_API_URL: &str = "http://api.openweathermap.org/data/2.5/air_pollution";

/// Longest accepted snapshot time-to-live: one year.
pub const MAX_SNAPSHOT_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// HTTP listen port.
    pub port: u16,

    /// Air-pollution API base URL.
    pub api_url: String,

    /// Air-pollution API key; collection is disabled without one.
    pub api_key: Option<String>,

    /// Time-to-live of each city's latest snapshot, in seconds.
    pub snapshot_ttl_secs: u64,

    /// Path of the JSON model artifact, if any.
    pub model_path: Option<String>,

    /// Temporal feature policy for the prediction endpoint.
    pub serving_lag_source: LagSource,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `PORT` – listen port (default: 8000)
/// - `OPENWEATHER_API_URL` – pollution API URL (default: [`DEFAULT_API_URL`])
/// - `OPENWEATHER_API_KEY` – pollution API key (default: unset)
/// - `SNAPSHOT_TTL_SECS` – latest snapshot expiry, 1 to [`MAX_SNAPSHOT_TTL_SECS`] (default: 3600)
/// - `MODEL_PATH` – JSON model artifact (default: unset)
/// - `SERVING_LAG_SOURCE` – `approximated` or `city_history` (default: `approximated`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env!("DB_POOL_MAX", u32, 5);
    let port = parse_env!("PORT", u16, 8000);
    let api_url = env::var("OPENWEATHER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let api_key = env::var("OPENWEATHER_API_KEY").ok().filter(|k| !k.is_empty());
    let snapshot_ttl_secs = check_snapshot_ttl(parse_env!("SNAPSHOT_TTL_SECS", u64, 3600))?;
    let model_path = env::var("MODEL_PATH").ok().filter(|p| !p.is_empty());
    let serving_lag_source = env::var("SERVING_LAG_SOURCE")
        .ok()
        .map(|v| v.parse::<LagSource>())
        .transpose()
        .map_err(|e| anyhow!("Invalid SERVING_LAG_SOURCE: {}", e))?
        .unwrap_or(LagSource::Approximated);

    Ok(Config {
        db_url,
        db_pool_max,
        port,
        api_url,
        api_key,
        snapshot_ttl_secs,
        model_path,
        serving_lag_source,
    })
}

/// Reject a snapshot TTL that is zero or exceeds [`MAX_SNAPSHOT_TTL_SECS`].
fn check_snapshot_ttl(secs: u64) -> Result<u64> {
    // ---
    if secs == 0 || secs > MAX_SNAPSHOT_TTL_SECS {
        return Err(anyhow!(
            "Invalid SNAPSHOT_TTL_SECS: {} (expected 1..={})",
            secs,
            MAX_SNAPSHOT_TTL_SECS
        ));
    }
    Ok(secs)
}

/// Replace the password of a connection URL with `****`.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password and never prints the API key.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!("  PORT                : {}", self.port);
        tracing::info!("  OPENWEATHER_API_URL : {}", self.api_url);
        tracing::info!(
            "  OPENWEATHER_API_KEY : {}",
            if self.api_key.is_some() { "set" } else { "unset" }
        );
        tracing::info!("  SNAPSHOT_TTL_SECS   : {}", self.snapshot_ttl_secs);
        tracing::info!(
            "  MODEL_PATH          : {}",
            self.model_path.as_deref().unwrap_or("unset")
        );
        tracing::info!("  SERVING_LAG_SOURCE  : {}", self.serving_lag_source);
    }
}
