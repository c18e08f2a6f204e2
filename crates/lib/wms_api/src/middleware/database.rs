//! Database middleware — hands each request a store handle and classifies
//! store failures by connection health.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use wms_core::db::DbHandle;
use wms_core::store::{ConnectionState, StoreError};

use crate::AppState;
use crate::error::{AppError, DATABASE_CONNECTION_ERROR, DATABASE_OPERATION_ERROR, ErrorReport};

/// Store handle for the current request, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct Db(pub DbHandle);

/// Classification of a store failure given the connection state observed
/// when it surfaced.
pub fn classify(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => DATABASE_OPERATION_ERROR,
        _ => DATABASE_CONNECTION_ERROR,
    }
}

/// Axum middleware: acquires a handle from the pool and injects [`Db`].
///
/// A failed acquire answers 500 without calling the handler. Store failures
/// returned by the handler are not retried; their `error` is rewritten from
/// the handle's state at the moment they surfaced.
pub async fn with_database(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let handle = match state.pool.acquire().await {
        Ok(handle) => handle,
        Err(e) => {
            let e = match e {
                StoreError::Connection(_) => e,
                other => StoreError::Connection(other.to_string()),
            };
            return AppError::Store(e).into_response();
        }
    };
    request.extensions_mut().insert(Db(handle.clone()));

    let response = next.run(request).await;
    let Some(report) = response
        .extensions()
        .get::<ErrorReport>()
        .filter(|report| report.store_failure)
    else {
        return response;
    };

    let connection_state = handle.state();
    let mut report = report.clone();
    report.body.error = classify(connection_state).to_string();
    warn!(
        state = ?connection_state,
        degraded = handle.is_degraded(),
        classification = %report.body.error,
        "store failure"
    );
    report.render(false)
}
