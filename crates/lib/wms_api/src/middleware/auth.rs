//! Authentication middleware — bearer extraction, token validation and role
//! checks, applied per route with an [`AuthPolicy`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use wms_core::auth::{AuthError, blacklist};
use wms_core::models::auth::{Identity, Role};

use crate::AppState;
use crate::error::{AppError, AppResult};

const BEARER_PREFIX: &str = "bearer ";

/// Who may reach a route.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub require_auth: bool,
    /// `None` admits every authenticated role.
    pub allowed_roles: Option<Vec<Role>>,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_roles: None,
        }
    }
}

impl AuthPolicy {
    /// No token needed; handlers still receive an empty [`AuthContext`].
    pub fn public() -> Self {
        Self {
            require_auth: false,
            allowed_roles: None,
        }
    }

    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            require_auth: true,
            allowed_roles: Some(roles.into_iter().collect()),
        }
    }

    pub fn permits(&self, role: &Role) -> bool {
        self.allowed_roles
            .as_ref()
            .is_none_or(|allowed| allowed.contains(role))
    }
}

/// Per-request authentication result, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Option<Identity>,
    pub token: Option<String>,
    pub headers: HeaderMap,
}

impl AuthContext {
    /// The caller's identity; routes with a public policy have none.
    pub fn require_identity(&self) -> AppResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// State for [`authorize`]: the shared app state plus the route's policy.
#[derive(Clone)]
pub struct AuthGuard {
    state: AppState,
    policy: Arc<AuthPolicy>,
}

impl AuthGuard {
    pub fn new(state: AppState, policy: AuthPolicy) -> Self {
        Self {
            state,
            policy: Arc::new(policy),
        }
    }
}

/// Token from the `Authorization` header. Accepts `Bearer <t>`, a bare
/// `<t>`, and the doubled `Bearer Bearer <t>` some clients send.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let mut token = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    for _ in 0..2 {
        match strip_bearer(token) {
            Some(rest) => token = rest.trim_start(),
            None => break,
        }
    }
    let token = token.trim_end();
    // A scheme with nothing after it carries no token.
    (!token.is_empty() && !token.eq_ignore_ascii_case(BEARER_PREFIX.trim_end())).then_some(token)
}

fn strip_bearer(value: &str) -> Option<&str> {
    let prefix = value.get(..BEARER_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(BEARER_PREFIX)
        .then(|| &value[BEARER_PREFIX.len()..])
}

/// Axum middleware: resolves the bearer token to an identity, enforces the
/// route's policy and injects [`AuthContext`] into request extensions.
pub async fn authorize(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers().clone();

    if !guard.policy.require_auth {
        request.extensions_mut().insert(AuthContext {
            identity: None,
            token: None,
            headers,
        });
        return Ok(next.run(request).await);
    }

    let token = bearer_token(&headers)
        .ok_or(AuthError::MissingToken)?
        .to_string();
    let identity = guard.state.validator.validate(&token)?;

    if guard.state.config.enforce_blacklist {
        let db = guard.state.pool.acquire().await?;
        if blacklist::is_revoked(db.store(), &token).await? {
            debug!(user_id = %identity.user_id, "revoked token presented");
            return Err(AuthError::TokenRevoked.into());
        }
    }

    if !guard.policy.permits(&identity.role) {
        warn!(user_id = %identity.user_id, role = %identity.role, "role not permitted");
        return Err(AppError::Forbidden(format!(
            "Role '{}' is not permitted to access this resource",
            identity.role
        )));
    }

    request.extensions_mut().insert(AuthContext {
        identity: Some(identity),
        token: Some(token),
        headers,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_forms() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearer Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  u1:alice:user")), Some("u1:alice:user"));
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer abc  ")), Some("abc"));
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn policy_membership() {
        assert!(AuthPolicy::authenticated().permits(&Role::User));
        let admins = AuthPolicy::roles([Role::Admin]);
        assert!(admins.permits(&Role::Admin));
        assert!(!admins.permits(&Role::Supervisor));
        assert!(!admins.permits(&Role::Other("root".into())));
    }
}
