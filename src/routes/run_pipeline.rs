use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{unavailable, AppState};
use crate::pipeline::{run_batch, PruneReport};
use crate::store;

// ---

#[derive(Debug, Serialize)]
struct RunResponse {
    run_id: Uuid,
    feature_rows: usize,
    snapshots: usize,
    pruning: PruneReport,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/pipeline/run", post(handler))
}

/// Handle `POST /api/pipeline/run`: load, derive, persist.
async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let run_id = Uuid::new_v4();
    info!("POST /api/pipeline/run - run {} starting", run_id);

    // Step 1: Load raw readings
    debug!("Run {} - Step 1", run_id);
    let readings = match store::load_readings(&state.pool).await {
        Ok(r) => r,
        Err(e) => return unavailable("Database", e),
    };

    // Step 2: Derive features (pure)
    debug!("Run {} - Step 2", run_id);
    let output = run_batch(readings);

    // Step 3: Persist the feature table
    debug!("Run {} - Step 3", run_id);
    if let Err(e) = store::replace_feature_table(&state.pool, &output.table).await {
        return unavailable("Database", e);
    }

    // Step 4: Refresh latest snapshots
    debug!("Run {} - Step 4", run_id);
    let latest = output.table.latest_per_city();
    let snapshots =
        match store::write_snapshots(&state.pool, &latest, state.config.snapshot_ttl_secs).await {
            Ok(n) => n,
            Err(e) => return unavailable("Snapshot cache", e),
        };

    info!(
        "Run {} complete: {} feature rows, {} snapshots",
        run_id,
        output.table.len(),
        snapshots
    );

    (
        StatusCode::OK,
        Json(RunResponse {
            run_id,
            feature_rows: output.table.len(),
            snapshots,
            pruning: output.report,
        }),
    )
        .into_response()
}
