//! Authentication request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthContext;
use crate::middleware::database::Db;
use crate::models::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse, VerifyResponse};
use crate::services::auth;

/// `POST /api/auth/register` — create an account and return a token.
pub async fn register_handler(
    State(state): State<AppState>,
    Extension(Db(db)): Extension<Db>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let resp = auth::register(db.store(), &state.config, &body.username, &body.password).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /api/auth/login` — authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Extension(Db(db)): Extension<Db>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&db, &state, &body.username, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /api/auth/logout` — revoke the presented token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(Db(db)): Extension<Db>,
    Extension(context): Extension<AuthContext>,
) -> AppResult<Json<MessageResponse>> {
    let resp = auth::logout(db.store(), &state.config, &context).await?;
    Ok(Json(resp))
}

/// `GET /api/auth/verify` — identity behind the presented token.
pub async fn verify_handler(
    Extension(Db(db)): Extension<Db>,
    Extension(context): Extension<AuthContext>,
) -> AppResult<Json<VerifyResponse>> {
    let resp = auth::verify(db.store(), &context).await?;
    Ok(Json(resp))
}
