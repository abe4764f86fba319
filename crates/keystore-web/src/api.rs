//! Service status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// Report liveness and whether the database answers.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let database = state.db.ping().await;
    if !database {
        tracing::warn!("database health check failed");
    }

    Json(StatusResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
