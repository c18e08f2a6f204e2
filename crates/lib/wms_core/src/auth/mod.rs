//! Authentication and authorization logic.
//!
//! Provides the multi-format bearer token validator, JWT minting, password
//! hashing, user queries and the token blacklist.

pub mod blacklist;
pub mod jwt;
pub mod password;
pub mod queries;
pub mod token;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Missing authorization token")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
