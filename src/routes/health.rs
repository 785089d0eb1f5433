// src/routes/health.rs
//! Health check endpoints for the air-quality service.
//!
//! - `GET /` and `GET /health` are static liveness probes that never touch the
//!   database or the model.
//! - `GET /api/health` reports whether the database answers and whether a
//!   model is loaded.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::store;

/// JSON response body for the liveness endpoints.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

/// JSON response body for `/api/health`.
#[derive(Serialize)]
struct DependencyHealth {
    status: &'static str,
    database: &'static str,
    model: &'static str,
    collector: &'static str,
}

/// Handle `GET /` and `GET /health`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "Air Quality Alert System",
    })
}

/// Handle `GET /api/health`.
async fn dependencies(State(state): State<AppState>) -> Json<DependencyHealth> {
    // ---
    let database = if store::ping(&state.pool).await {
        "connected"
    } else {
        "unavailable"
    };

    Json(DependencyHealth {
        status: "ok",
        database,
        model: if state.model.is_some() {
            "loaded"
        } else {
            "not_loaded"
        },
        collector: if state.collector.is_some() {
            "configured"
        } else {
            "not_configured"
        },
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/health", get(dependencies))
}
