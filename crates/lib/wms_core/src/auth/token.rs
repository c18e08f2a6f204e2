//! Bearer token validation.
//!
//! A bearer string may be encoded four ways. Each encoding has a decoder that
//! never panics and reports one of three outcomes: it accepted the token, it
//! recognised the token but rejected it, or the token is not in its format.
//! Decoders run in a fixed order and the first non-skip outcome wins:
//!
//! 1. simplified `userId:username:role` (no signature, no expiry)
//! 2. HS256 JWT (`exp` in seconds)
//! 3. legacy base64 JSON (`exp` in milliseconds)
//! 4. `dev-fallback[-<username>]`, development mode only

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::AuthError;
use super::jwt::verify_token;
use crate::models::auth::{Identity, Role};

/// Literal prefix of development fallback tokens.
pub const DEV_FALLBACK: &str = "dev-fallback";

/// Outcome of a single decoder.
#[derive(Debug)]
enum Decoded {
    Accept(Identity),
    Reject(AuthError),
    Skip,
}

type Decoder = fn(&TokenValidator, &str) -> Decoded;

const DECODERS: [(&str, Decoder); 4] = [
    ("simplified", decode_simplified),
    ("jwt", decode_jwt),
    ("legacy", decode_legacy),
    ("dev-fallback", decode_dev_fallback),
];

/// Validates bearer strings against the ordered decoder chain.
#[derive(Clone)]
pub struct TokenValidator {
    secret: Vec<u8>,
    development: bool,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(secret: impl Into<Vec<u8>>, development: bool) -> Self {
        Self {
            secret: secret.into(),
            development,
        }
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Resolve a bearer string (already stripped of any `Bearer ` prefix).
    pub fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let outcome = DECODERS
            .iter()
            .find_map(|(format, decode)| match decode(self, token) {
                Decoded::Skip => None,
                decoded => Some((*format, decoded)),
            });

        match outcome {
            Some((format, Decoded::Accept(identity))) => {
                debug!(format, user_id = %identity.user_id, "token accepted");
                Ok(identity)
            }
            Some((format, Decoded::Reject(err))) => {
                debug!(format, error = %err, "token rejected");
                Err(err)
            }
            _ => Err(AuthError::InvalidTokenFormat),
        }
    }
}

/// Mint a simplified `userId:username:role` token.
pub fn simplified_token(identity: &Identity) -> String {
    format!(
        "{}:{}:{}",
        identity.user_id, identity.username, identity.role
    )
}

fn decode_simplified(_: &TokenValidator, token: &str) -> Decoded {
    if !token.contains(':') {
        return Decoded::Skip;
    }
    let segments: Vec<&str> = token.split(':').collect();
    if segments.len() < 3 {
        return Decoded::Skip;
    }
    Decoded::Accept(Identity::new(
        segments[0],
        segments[1],
        Role::parse(segments[2]),
    ))
}

fn decode_jwt(validator: &TokenValidator, token: &str) -> Decoded {
    match verify_token(token, &validator.secret).and_then(|claims| claims.identity()) {
        Some(identity) => Decoded::Accept(identity),
        None => Decoded::Skip,
    }
}

/// Payload of a legacy base64 token. `exp` is in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPayload {
    user_id: Option<serde_json::Value>,
    username: Option<String>,
    role: Option<String>,
    exp: Option<f64>,
}

fn decode_legacy(_: &TokenValidator, token: &str) -> Decoded {
    let Ok(bytes) = STANDARD.decode(token) else {
        return Decoded::Skip;
    };
    let Ok(payload) = serde_json::from_slice::<LegacyPayload>(&bytes) else {
        return Decoded::Skip;
    };

    if let Some(exp) = payload.exp
        && exp < Utc::now().timestamp_millis() as f64
    {
        return Decoded::Reject(AuthError::TokenExpired);
    }

    let user_id = match payload.user_id {
        Some(serde_json::Value::String(id)) if !id.is_empty() => id,
        Some(serde_json::Value::Number(id)) => id.to_string(),
        _ => return Decoded::Skip,
    };
    let role = payload
        .role
        .as_deref()
        .map(Role::parse)
        .unwrap_or(Role::User);
    Decoded::Accept(Identity::new(
        user_id,
        payload.username.unwrap_or_default(),
        role,
    ))
}

fn decode_dev_fallback(validator: &TokenValidator, token: &str) -> Decoded {
    if !validator.development {
        return Decoded::Skip;
    }
    let username = if token == DEV_FALLBACK {
        "admin"
    } else {
        match token
            .strip_prefix(DEV_FALLBACK)
            .and_then(|rest| rest.strip_prefix('-'))
        {
            Some(name) if !name.is_empty() => name,
            _ => return Decoded::Skip,
        }
    };
    let role = match username {
        "admin" => Role::Admin,
        "supervisor" => Role::Supervisor,
        _ => Role::User,
    };
    Decoded::Accept(Identity::new(format!("dev-{username}"), username, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_token;
    use chrono::Duration;
    use serde_json::json;

    const SECRET: &[u8] = b"validator-secret";

    fn validator() -> TokenValidator {
        TokenValidator::new(SECRET, false)
    }

    fn legacy(payload: serde_json::Value) -> String {
        STANDARD.encode(payload.to_string())
    }

    #[test]
    fn simplified_token_resolves_segments() {
        let identity = validator().validate("u1:alice:admin").unwrap();
        assert_eq!(identity, Identity::new("u1", "alice", Role::Admin));
    }

    #[test]
    fn simplified_token_keeps_unknown_roles() {
        let identity = validator().validate("u1:alice:overlord").unwrap();
        assert_eq!(identity.role, Role::Other("overlord".into()));
    }

    #[test]
    fn simplified_token_ignores_extra_segments() {
        let identity = validator().validate("u1:alice:user:1700000000").unwrap();
        assert_eq!(identity, Identity::new("u1", "alice", Role::User));
    }

    #[test]
    fn two_segments_are_not_simplified() {
        let err = validator().validate("u1:alice").unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenFormat));
    }

    #[test]
    fn simplified_round_trips_minted_token() {
        let identity = Identity::new("42", "dora", Role::Supervisor);
        let token = simplified_token(&identity);
        assert_eq!(validator().validate(&token).unwrap(), identity);
    }

    #[test]
    fn jwt_is_accepted() {
        let identity = Identity::new("u2", "bob", Role::Supervisor);
        let token = generate_token(&identity, SECRET, Duration::minutes(10)).unwrap();
        assert_eq!(validator().validate(&token).unwrap(), identity);
    }

    #[test]
    fn jwt_with_wrong_secret_falls_through() {
        let identity = Identity::new("u2", "bob", Role::User);
        let token = generate_token(&identity, b"someone-else", Duration::minutes(10)).unwrap();
        let err = validator().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenFormat));
    }

    #[test]
    fn expired_jwt_falls_through_instead_of_expiring() {
        let identity = Identity::new("u2", "bob", Role::User);
        let token = generate_token(&identity, SECRET, Duration::hours(-3)).unwrap();
        let err = validator().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenFormat));
    }

    #[test]
    fn non_jwt_base64_json_succeeds_via_legacy_path() {
        let token = legacy(json!({"userId": "u3", "username": "carol", "role": "user"}));
        assert!(!token.contains(':'));
        let identity = validator().validate(&token).unwrap();
        assert_eq!(identity, Identity::new("u3", "carol", Role::User));
    }

    #[test]
    fn legacy_expiry_is_milliseconds() {
        // A seconds-based value would be decades in the past as milliseconds.
        let future_ms = Utc::now().timestamp_millis() + 60_000;
        let token = legacy(json!({"userId": "u3", "username": "carol", "role": "user", "exp": future_ms}));
        assert!(validator().validate(&token).is_ok());

        let future_secs = Utc::now().timestamp() + 60;
        let token = legacy(json!({"userId": "u3", "username": "carol", "role": "user", "exp": future_secs}));
        assert!(matches!(
            validator().validate(&token).unwrap_err(),
            AuthError::TokenExpired
        ));
    }

    #[test]
    fn legacy_without_user_id_is_invalid() {
        let token = legacy(json!({"username": "carol"}));
        assert!(matches!(
            validator().validate(&token).unwrap_err(),
            AuthError::InvalidTokenFormat
        ));
    }

    #[test]
    fn dev_fallback_requires_development_mode() {
        assert!(matches!(
            validator().validate("dev-fallback-alice").unwrap_err(),
            AuthError::InvalidTokenFormat
        ));

        let dev = TokenValidator::new(SECRET, true);
        let identity = dev.validate("dev-fallback-alice").unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn dev_fallback_roles() {
        let dev = TokenValidator::new(SECRET, true);
        assert_eq!(dev.validate("dev-fallback").unwrap().role, Role::Admin);
        assert_eq!(dev.validate("dev-fallback-admin").unwrap().role, Role::Admin);
        assert_eq!(
            dev.validate("dev-fallback-supervisor").unwrap().role,
            Role::Supervisor
        );
        assert!(dev.validate("dev-fallback-").is_err());
    }

    #[test]
    fn empty_token_is_missing() {
        assert!(matches!(
            validator().validate("   ").unwrap_err(),
            AuthError::MissingToken
        ));
    }

    #[test]
    fn garbage_is_invalid_format() {
        assert!(matches!(
            validator().validate("not a token").unwrap_err(),
            AuthError::InvalidTokenFormat
        ));
    }
}
