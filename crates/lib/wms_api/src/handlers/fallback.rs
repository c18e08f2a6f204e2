//! Envelopes for unmatched paths and methods.

use crate::error::AppError;

pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
