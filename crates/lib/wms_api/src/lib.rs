//! # wms_api
//!
//! HTTP API library for the WMS training backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{MethodRouter, get, post};
use tower_http::trace::TraceLayer;
use wms_core::auth::token::TokenValidator;
use wms_core::db::ConnectionPool;
use wms_core::models::auth::Role;

use crate::config::ApiConfig;
use crate::handlers::{auth, fallback, health, import, processes};
use crate::middleware::auth::{AuthGuard, AuthPolicy, authorize};
use crate::middleware::cors::cors;
use crate::middleware::database::with_database;
use crate::middleware::diagnostics::diagnostics;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document store connection cache.
    pub pool: Arc<ConnectionPool>,
    /// Bearer token validator built from the configured secret.
    pub validator: TokenValidator,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(pool: Arc<ConnectionPool>, config: ApiConfig) -> Self {
        let validator = TokenValidator::new(config.jwt_secret.as_bytes(), config.development);
        Self {
            pool,
            validator,
            config,
        }
    }
}

/// Wrap `route` with authentication (outer) and database access (inner).
fn guarded(
    state: &AppState,
    policy: AuthPolicy,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route
        .route_layer(from_fn_with_state(state.clone(), with_database))
        .route_layer(from_fn_with_state(
            AuthGuard::new(state.clone(), policy),
            authorize,
        ))
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let editors = AuthPolicy::roles([Role::Admin, Role::Supervisor]);
    let admins = AuthPolicy::roles([Role::Admin]);

    Router::new()
        .route(
            routes::POST_API_AUTH_REGISTER,
            guarded(&state, AuthPolicy::public(), post(auth::register_handler)),
        )
        .route(
            routes::POST_API_AUTH_LOGIN,
            guarded(&state, AuthPolicy::public(), post(auth::login_handler)),
        )
        .route(
            routes::POST_API_AUTH_LOGOUT,
            guarded(&state, AuthPolicy::authenticated(), post(auth::logout_handler)),
        )
        .route(
            routes::GET_API_AUTH_VERIFY,
            guarded(&state, AuthPolicy::authenticated(), get(auth::verify_handler)),
        )
        .route(
            routes::GET_API_PROCESSES,
            guarded(
                &state,
                AuthPolicy::authenticated(),
                get(processes::list_processes_handler),
            ),
        )
        .route(
            routes::POST_API_PROCESSES,
            guarded(&state, editors, post(processes::save_processes_handler)),
        )
        .route(
            routes::POST_API_IMPORT_ENTITY,
            guarded(
                &state,
                admins,
                post(import::import_handler).layer(DefaultBodyLimit::max(import::IMPORT_BODY_LIMIT)),
            ),
        )
        .route(routes::GET_API_HEALTH, get(health::health_handler))
        .fallback(fallback::not_found)
        .method_not_allowed_fallback(fallback::method_not_allowed)
        .layer(from_fn_with_state(state.clone(), diagnostics))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(cors))
        .with_state(state)
}
