//! Process request handlers.

use axum::{Extension, Json};
use wms_core::processes::{save_processes, visible_processes};

use crate::error::AppResult;
use crate::middleware::auth::AuthContext;
use crate::middleware::database::Db;
use crate::models::{ProcessListResponse, SaveProcessesRequest, SaveProcessesResponse};

/// `GET /api/processes` — global processes plus the caller's own.
pub async fn list_processes_handler(
    Extension(Db(db)): Extension<Db>,
    Extension(context): Extension<AuthContext>,
) -> AppResult<Json<ProcessListResponse>> {
    let identity = context.require_identity()?;
    let processes = visible_processes(db.store(), identity).await?;
    Ok(Json(ProcessListResponse {
        success: true,
        processes,
    }))
}

/// `POST /api/processes` — upsert processes by `id` in one transaction.
pub async fn save_processes_handler(
    Extension(Db(db)): Extension<Db>,
    Extension(context): Extension<AuthContext>,
    Json(body): Json<SaveProcessesRequest>,
) -> AppResult<Json<SaveProcessesResponse>> {
    let identity = context.require_identity()?;
    let count = save_processes(db.store(), identity, body.processes).await?;
    Ok(Json(SaveProcessesResponse {
        success: true,
        count,
        message: format!("Saved {count} processes"),
    }))
}
