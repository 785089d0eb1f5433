//! Prediction endpoint: serving-mode features, model prediction, risk label.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::{error_response, AppState};
use crate::features::RiskLevel;
use crate::models::PredictionRequest;
use crate::pipeline::{derive_serving, LagSource, ServingInput, ServingRecord};
use crate::store;

// ---

/// Response of `POST /api/predict`.
///
/// `lag_source` tells the caller whether the temporal features behind
/// `predicted_aqi` were exact or approximated.
#[derive(Debug, Serialize)]
struct PredictionResponse {
    predicted_aqi: f64,
    risk_level: RiskLevel,
    health_risk_score: f64,
    lag_source: LagSource,
    features: ServingRecord,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/predict", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> impl IntoResponse {
    // ---
    info!("POST /api/predict - {}", request.city);

    let now = Utc::now();
    let input = match ServingInput::from_request(&request, now.month(), now) {
        Ok(input) => input,
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    let Some(model) = state.model.as_ref() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Model not loaded");
    };

    let history = match state.config.serving_lag_source {
        LagSource::Approximated => None,
        LagSource::CityHistory => match store::load_city_history(&state.pool, input.city).await {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("History for {} unavailable, approximating lags: {}", input.city, e);
                None
            }
        },
    };

    let record = derive_serving(&input, history.as_ref());

    let predicted_aqi = match model.predict(&record.vector) {
        Ok(y) => y,
        Err(e) => {
            error!("Prediction failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let response = PredictionResponse {
        predicted_aqi,
        risk_level: RiskLevel::from_predicted_aqi(predicted_aqi),
        health_risk_score: record.health_risk_score,
        lag_source: record.lag_source,
        features: record,
    };
    (StatusCode::OK, Json(response)).into_response()
}
