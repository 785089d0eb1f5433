use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::info;

use super::{error_response, unavailable, AppState};
use crate::models::City;
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/current/{city}", get(handler))
}

/// Handle `GET /api/current/{city}`: the latest cached snapshot.
async fn handler(Path(city): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    // ---
    info!("GET /api/current/{}", city);

    let not_found = || error_response(StatusCode::NOT_FOUND, format!("No data found for {}", city));

    let Ok(parsed) = city.parse::<City>() else {
        return not_found();
    };

    match store::fetch_snapshot(&state.pool, parsed).await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => not_found(),
        Err(e) => unavailable("Snapshot cache", e),
    }
}
