//! Application entry point for the `aqi-healthflow` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Loading the prediction model and checking its input schema
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX`, `PORT`, `OPENWEATHER_API_URL`, `OPENWEATHER_API_KEY`,
//!   `SNAPSHOT_TTL_SECS`, `MODEL_PATH`, `SERVING_LAG_SOURCE` (optional, see
//!   `config`)
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use aqi_healthflow::collector::Collector;
use aqi_healthflow::predictor::{AqiModel, LinearModel};
use aqi_healthflow::routes::{self, AppState};
use aqi_healthflow::{config, schema, Config, ModelError};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let model = load_model(&cfg)?;
    let collector = match cfg.api_key.as_deref() {
        Some(key) => Some(Collector::new(&cfg.api_url, key)?),
        None => {
            tracing::warn!("OPENWEATHER_API_KEY unset, collection disabled");
            None
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(AppState {
        pool,
        config: cfg,
        model,
        collector,
    });

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Load the model named by `MODEL_PATH`.
///
/// A missing file leaves the service running without predictions; a model
/// whose input columns differ from the feature columns aborts startup.
fn load_model(cfg: &Config) -> Result<Option<Arc<dyn AqiModel>>> {
    // ---
    let Some(path) = cfg.model_path.as_deref() else {
        tracing::warn!("MODEL_PATH unset, predictions disabled");
        return Ok(None);
    };

    match LinearModel::load(path) {
        Ok(model) => {
            tracing::info!(
                "Loaded model from {} ({} input columns)",
                path,
                model.columns().len()
            );
            Ok(Some(Arc::new(model)))
        }
        Err(ModelError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Model file {} not found, predictions disabled", path);
            Ok(None)
        }
        Err(e) => Err(anyhow::anyhow!("Could not load model '{}': {}", path, e)),
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `AXUM_LOG_LEVEL` env var
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
