//! HTTP routes gateway.
//!
//! Each sibling module exports a subrouter over [`AppState`]; this gateway
//! merges them so `main.rs` never needs to know individual endpoints.

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use crate::collector::Collector;
use crate::predictor::AqiModel;
use crate::Config;

mod get_current;
mod get_reference;
mod health;
mod ingest;
mod predict;
mod run_pipeline;

// ---

/// Shared state, built once in `main` and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub model: Option<Arc<dyn AqiModel>>,
    pub collector: Option<Collector>,
}

/// All endpoints, open to browser clients of any origin.
pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(ingest::router())
        .merge(run_pipeline::router())
        .merge(get_current::router())
        .merge(get_reference::router())
        .merge(predict::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// JSON error body, `{"detail": "..."}`.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

pub(crate) fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    // ---
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Downstream store failures are reported as unavailability.
pub(crate) fn unavailable(what: &str, e: impl std::fmt::Display) -> Response {
    // ---
    tracing::error!("{} unavailable: {}", what, e);
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} unavailable", what),
    )
}
