//! Application error types and the JSON error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use wms_core::auth::AuthError;
use wms_core::import::ImportError;
use wms_core::processes::SaveError;
use wms_core::store::StoreError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// `error` value of a store failure on a healthy connection.
pub const DATABASE_OPERATION_ERROR: &str = "Database operation error";
/// `error` value of a store failure on a connection that is not ready.
pub const DATABASE_CONNECTION_ERROR: &str = "Database connection error";

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Import validation failed: {message}")]
    ImportValidation {
        message: String,
        offending_rows: usize,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error")]
    Internal(String),
}

/// Development-only detail about a failure.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub name: String,
    pub detail: String,
}

/// `{success:false, error, message, diagnostics?}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Rendered error attached to the response extensions, so outer middleware
/// can reclassify or enrich the envelope.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub body: ErrorBody,
    pub diagnostics: Diagnostics,
    /// Raised by a store call.
    pub store_failure: bool,
}

impl ErrorReport {
    /// Build the response, keeping a copy of the report in its extensions.
    pub fn render(mut self, with_diagnostics: bool) -> Response {
        if with_diagnostics {
            self.body.diagnostics = Some(self.diagnostics.clone());
        }
        let mut response = (self.status, Json(self.body.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl AppError {
    pub fn report(&self) -> ErrorReport {
        let (status, name, error, message) = match self {
            AppError::Validation(m) => (
                StatusCode::BAD_REQUEST,
                "ValidationError",
                "Validation error",
                m.clone(),
            ),
            AppError::Unauthorized(m) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationError",
                "Authentication failed",
                m.clone(),
            ),
            AppError::Forbidden(m) => (
                StatusCode::FORBIDDEN,
                "AuthorizationError",
                "Access denied",
                m.clone(),
            ),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "NotFoundError", "Not found", m.clone()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowedError",
                "Method not allowed",
                "Method not allowed".to_string(),
            ),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "ConflictError", "Conflict", m.clone()),
            AppError::ImportValidation { message, .. } => (
                StatusCode::BAD_REQUEST,
                "ImportValidationError",
                "Import validation failed",
                message.clone(),
            ),
            AppError::Store(StoreError::Connection(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DatabaseConnectionError",
                DATABASE_CONNECTION_ERROR,
                INTERNAL_MESSAGE.to_string(),
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DatabaseOperationError",
                DATABASE_OPERATION_ERROR,
                INTERNAL_MESSAGE.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                INTERNAL_MESSAGE,
                INTERNAL_MESSAGE.to_string(),
            ),
        };
        let detail = match self {
            AppError::Store(e) => e.to_string(),
            AppError::Internal(m) => m.clone(),
            other => other.to_string(),
        };
        ErrorReport {
            status,
            body: ErrorBody {
                success: false,
                error: error.to_string(),
                message,
                offending_rows: match self {
                    AppError::ImportValidation { offending_rows, .. } => Some(*offending_rows),
                    _ => None,
                },
                diagnostics: None,
            },
            diagnostics: Diagnostics {
                name: name.to_string(),
                detail,
            },
            store_failure: matches!(self, AppError::Store(_)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Store(_) | AppError::Internal(_)) {
            tracing::error!(error = %self, "request failed");
        }
        self.report().render(false)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::MissingToken => AppError::Unauthorized("No token provided".into()),
            AuthError::TokenExpired
            | AuthError::InvalidTokenFormat
            | AuthError::TokenRevoked => AppError::Unauthorized(e.to_string()),
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::Store(e) => AppError::Store(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::UnsupportedEntity(_)
            | ImportError::MissingSheet(_)
            | ImportError::Workbook(_) => AppError::Validation(e.to_string()),
            ImportError::Validation {
                message,
                offending_rows,
            } => AppError::ImportValidation {
                message,
                offending_rows,
            },
            ImportError::Store(e) => AppError::Store(e),
            ImportError::ReplaceIncomplete { .. } | ImportError::CountMismatch { .. } => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<SaveError> for AppError {
    fn from(e: SaveError) -> Self {
        match e {
            SaveError::Validation(msg) => AppError::Validation(msg),
            SaveError::Forbidden(msg) => AppError::Forbidden(msg),
            SaveError::Store(e) => AppError::Store(e),
        }
    }
}
