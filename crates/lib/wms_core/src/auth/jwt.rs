//! JWT token generation and verification.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::AuthError;
use crate::models::auth::{Identity, TokenClaims};

/// Default lifetime of tokens minted at login: 24 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Generate a signed HS256 JWT carrying `userId`, `sub`, `username` and `role`.
pub fn generate_token(identity: &Identity, secret: &[u8], ttl: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        user_id: Some(identity.user_id.clone()),
        sub: Some(identity.user_id.clone()),
        username: Some(identity.username.clone()),
        name: None,
        role: Some(identity.role.as_str().to_string()),
        iat: Some(now.timestamp()),
        exp: Some((now + ttl).timestamp()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a JWT, returning its claims on success.
///
/// `exp` is optional, but when present it is enforced. Bad signatures,
/// malformed input and expiry all collapse into `None`.
pub fn verify_token(token: &str, secret: &[u8]) -> Option<TokenClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.required_spec_claims.clear();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    match persist_secret(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            error = %e,
            "generated JWT secret could not be saved; tokens will not survive a restart"
        ),
    }
    secret
}

fn persist_secret(path: &Path, secret: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, secret)
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wms")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;

    const SECRET: &[u8] = b"unit-test-secret";

    #[test]
    fn generated_token_verifies_with_same_secret() {
        let identity = Identity::new("u-7", "bob", Role::Supervisor);
        let token = generate_token(&identity, SECRET, Duration::minutes(5)).unwrap();

        let claims = verify_token(&token, SECRET).expect("claims");
        assert_eq!(claims.identity().unwrap(), identity);
        assert!(claims.exp.unwrap() > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let identity = Identity::new("u-7", "bob", Role::User);
        let token = generate_token(&identity, SECRET, Duration::minutes(5)).unwrap();
        assert!(verify_token(&token, b"other-secret").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let identity = Identity::new("u-7", "bob", Role::User);
        let token = generate_token(&identity, SECRET, Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, SECRET).is_none());
    }

    #[test]
    fn persist_secret_reports_failures() {
        let dir = std::env::temp_dir().join(format!("wms-jwt-{}", crate::uuid::new_document_id()));
        let path = dir.join("nested").join("jwt-secret");
        persist_secret(&path, "s3cret").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "s3cret");

        // A regular file where a directory is needed.
        let blocked = path.join("jwt-secret");
        assert!(persist_secret(&blocked, "s3cret").is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn token_without_exp_is_accepted() {
        let claims = TokenClaims {
            sub: Some("u-9".into()),
            name: Some("carol".into()),
            role: Some("admin".into()),
            ..Default::default()
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

        let decoded = verify_token(&token, SECRET).expect("claims");
        assert_eq!(
            decoded.identity().unwrap(),
            Identity::new("u-9", "carol", Role::Admin)
        );
    }
}
