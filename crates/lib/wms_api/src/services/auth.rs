//! Authentication service — register/login/logout/verify flows delegating to
//! `wms_core::auth`.

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use chrono::Duration;
use tracing::{info, warn};
use wms_core::auth::blacklist::{self, RevocationContext};
use wms_core::auth::jwt::{DEFAULT_TOKEN_TTL_SECS, generate_token};
use wms_core::auth::password::{hash_password, validate_password, verify_password};
use wms_core::auth::queries::{create_user, ensure_admin_role, find_user_by_username, username_exists};
use wms_core::auth::token::{DEV_FALLBACK, simplified_token};
use wms_core::auth::AuthError;
use wms_core::db::DbHandle;
use wms_core::models::auth::{Identity, Role};
use wms_core::store::DocumentStore;

use crate::AppState;
use crate::config::{ApiConfig, TokenFormat};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContext;
use crate::models::{AuthUser, MessageResponse, TokenResponse, VerifyResponse};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Mint a token for `identity` in the configured format.
pub fn mint_token(identity: &Identity, config: &ApiConfig) -> AppResult<String> {
    match config.token_format {
        TokenFormat::Jwt => Ok(generate_token(
            identity,
            config.jwt_secret.as_bytes(),
            Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        )?),
        TokenFormat::Simplified => Ok(simplified_token(identity)),
    }
}

fn token_response(token: String, identity: &Identity) -> TokenResponse {
    TokenResponse {
        success: true,
        token,
        user: AuthUser::from(identity),
    }
}

fn require_field(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Create an account and sign it in.
pub async fn register(
    store: &dyn DocumentStore,
    config: &ApiConfig,
    username: &str,
    password: &str,
) -> AppResult<TokenResponse> {
    let username = require_field(username, "Username")?;
    validate_password(password)?;

    if username_exists(store, &username).await? {
        return Err(AuthError::Conflict(format!("Username '{username}' is already taken")).into());
    }

    let hash = hash_password(password)?;
    let user = create_user(store, &username, &hash, Role::User).await?;
    let identity = user.identity();
    info!(user_id = %identity.user_id, role = %identity.role, "user registered");

    let token = mint_token(&identity, config)?;
    Ok(token_response(token, &identity))
}

/// Authenticate with username + password.
///
/// In development mode a degraded database handle cannot hold accounts, so
/// login answers with a dev-fallback token for the requested username.
pub async fn login(
    db: &DbHandle,
    state: &AppState,
    username: &str,
    password: &str,
) -> AppResult<TokenResponse> {
    let username = require_field(username, "Username")?;
    require_field(password, "Password")?;

    if db.is_degraded() && state.config.development {
        let token = format!("{DEV_FALLBACK}-{username}");
        let identity = state.validator.validate(&token)?;
        warn!(username = %identity.username, "database degraded, issuing dev-fallback token");
        return Ok(token_response(token, &identity));
    }

    let store = db.store();
    let user = find_user_by_username(store, &username)
        .await?
        .ok_or(AuthError::CredentialError)?;
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::CredentialError.into());
    }

    let identity = ensure_admin_role(store, user.identity()).await?;
    info!(user_id = %identity.user_id, "user logged in");

    let token = mint_token(&identity, &state.config)?;
    Ok(token_response(token, &identity))
}

/// Echo the caller's identity, restoring the admin role when it drifted.
pub async fn verify(store: &dyn DocumentStore, context: &AuthContext) -> AppResult<VerifyResponse> {
    let identity = context.require_identity()?.clone();
    let identity = ensure_admin_role(store, identity).await?;
    Ok(VerifyResponse {
        success: true,
        user: AuthUser::from(&identity),
    })
}

/// Put the presented token on the revocation list.
pub async fn logout(
    store: &dyn DocumentStore,
    config: &ApiConfig,
    context: &AuthContext,
) -> AppResult<MessageResponse> {
    let token = context
        .token
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;
    let expires_at = blacklist::revocation_expiry(token, config.jwt_secret.as_bytes());
    blacklist::revoke(
        store,
        token,
        context.identity.as_ref(),
        revocation_context(&context.headers),
        expires_at,
    )
    .await?;
    info!(user_id = ?context.identity.as_ref().map(|i| &i.user_id), "user logged out");
    Ok(MessageResponse {
        success: true,
        message: "Logged out successfully".into(),
    })
}

/// User agent and client address (first `X-Forwarded-For` hop).
pub fn revocation_context(headers: &HeaderMap) -> RevocationContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    RevocationContext {
        user_agent: header(USER_AGENT.as_str()).map(str::to_string),
        ip_address: header(FORWARDED_FOR)
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    }
}
