use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{unavailable, AppState};
use crate::store;

/// Rows returned when no limit is given.
const DEFAULT_REFERENCE_ROWS: usize = 1000;

// ---

/// Query parameters for the reference slice
#[derive(Debug, Deserialize)]
pub struct ReferenceQuery {
    limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/features/reference", get(handler))
}

/// Handle `GET /api/features/reference`: the most recent rows of the persisted
/// feature table as column-major reference data for drift monitoring.
///
/// Readings ingested after the last pipeline run are not included.
async fn handler(
    Query(params): Query<ReferenceQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /api/features/reference: {:?}", params);

    let limit = params.limit.unwrap_or(DEFAULT_REFERENCE_ROWS);
    match store::load_feature_table(&state.pool, Some(limit)).await {
        Ok(table) => (StatusCode::OK, Json(table.reference(None))).into_response(),
        Err(e) => unavailable("Database", e),
    }
}
