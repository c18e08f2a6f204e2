//! Attaches error diagnostics to envelopes in development mode.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::ErrorReport;

/// Axum middleware: re-renders error responses with `diagnostics` when the
/// server runs in development mode. A no-op otherwise.
pub async fn diagnostics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !state.config.development {
        return response;
    }
    match response.extensions().get::<ErrorReport>() {
        Some(report) => report.clone().render(true),
        None => response,
    }
}
