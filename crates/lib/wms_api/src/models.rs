//! Request and response bodies.

use serde::{Deserialize, Serialize};
use wms_core::models::auth::Identity;
use wms_core::store::Document;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub role: String,
}

impl From<&Identity> for AuthUser {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.user_id.clone(),
            username: identity.username.clone(),
            role: identity.role.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveProcessesRequest {
    pub processes: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveProcessesResponse {
    pub success: bool,
    pub count: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessListResponse {
    pub success: bool,
    pub processes: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub version: String,
    pub db_state: String,
    pub development: bool,
}
