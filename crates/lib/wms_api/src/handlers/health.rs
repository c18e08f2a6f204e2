//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health` — liveness plus the cached connection state. Never
/// opens a connection.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_state = state.pool.state().await;
    Json(HealthResponse {
        success: true,
        version: wms_core::version().to_string(),
        db_state: format!("{db_state:?}").to_lowercase(),
        development: state.config.development,
    })
}
