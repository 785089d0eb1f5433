//! Reading ingestion: a JSON batch from a client, a fresh poll of the
//! pollution API, or generated sample history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{error_response, unavailable, AppState};
use crate::models::{RawReading, Reading};
use crate::sample::{self, MAX_SAMPLE_DAYS};
use crate::store;

/// Days of history generated when no `days` is given.
const DEFAULT_SAMPLE_DAYS: u32 = 30;

// ---

#[derive(Debug, Serialize)]
struct IngestResponse {
    stored: usize,
}

/// Query parameters for sample generation
#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    days: Option<u32>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/readings", post(ingest))
        .route("/api/collect", post(collect))
        .route("/api/readings/sample", post(generate_sample))
}

/// Handle `POST /api/readings`.
///
/// The whole batch is rejected if any reading fails validation; nothing is
/// coerced.
async fn ingest(
    State(state): State<AppState>,
    Json(batch): Json<Vec<RawReading>>,
) -> impl IntoResponse {
    // ---
    info!("POST /api/readings - {} readings", batch.len());

    let mut readings = Vec::with_capacity(batch.len());
    for (i, raw) in batch.into_iter().enumerate() {
        match Reading::try_from(raw) {
            Ok(r) => readings.push(r),
            Err(e) => {
                warn!("Rejected reading {}: {}", i, e);
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("reading {}: {}", i, e),
                );
            }
        }
    }

    match store::insert_readings(&state.pool, &readings).await {
        Ok(stored) => (StatusCode::OK, Json(IngestResponse { stored })).into_response(),
        Err(e) => unavailable("Database", e),
    }
}

/// Handle `POST /api/collect`.
async fn collect(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let Some(collector) = state.collector.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Collector not configured (OPENWEATHER_API_KEY unset)",
        );
    };

    info!("POST /api/collect - polling pollution API");
    let readings = collector.collect_all().await;

    match store::insert_readings(&state.pool, &readings).await {
        Ok(stored) => (StatusCode::OK, Json(IngestResponse { stored })).into_response(),
        Err(e) => unavailable("Database", e),
    }
}

/// Handle `POST /api/readings/sample?days=N`: store `N` days of synthetic
/// hourly history for every city.
async fn generate_sample(
    Query(params): Query<SampleQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    let days = params.days.unwrap_or(DEFAULT_SAMPLE_DAYS);
    if days == 0 || days > MAX_SAMPLE_DAYS {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("days must be between 1 and {}, got {}", MAX_SAMPLE_DAYS, days),
        );
    }

    info!("POST /api/readings/sample - {} days", days);
    let readings = sample::generate_history(days, Utc::now(), &mut rand::thread_rng());

    match store::insert_readings(&state.pool, &readings).await {
        Ok(stored) => (StatusCode::OK, Json(IngestResponse { stored })).into_response(),
        Err(e) => unavailable("Database", e),
    }
}
