//! Authentication domain models.
//!
//! `Identity` is never persisted: it is produced per request by the token
//! validator. `UserRecord` and `BlacklistEntry` are stored as documents.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Role carried by an identity.
///
/// Simplified tokens are trusted verbatim, so a role string outside the three
/// known values survives as `Other` instead of failing validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Supervisor,
    Admin,
    Other(String),
}

impl Role {
    /// Parse a role string. Matching is exact (case-sensitive).
    pub fn parse(value: &str) -> Self {
        match value {
            "user" => Role::User,
            "supervisor" => Role::Supervisor,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
            Role::Other(value) => value.as_str(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Role::parse(&value))
    }
}

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role,
        }
    }
}

/// JWT claims. Every field is optional on decode: issuers differ in whether
/// they write `userId` or `sub`, `username` or `name`, and `exp` may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Resolve `userId|sub`, `username|name` and `role` into an identity.
    /// A missing role defaults to `user`.
    pub fn identity(&self) -> Option<Identity> {
        let user_id = self.user_id.as_ref().or(self.sub.as_ref())?;
        let username = self.username.as_ref().or(self.name.as_ref())?;
        let role = self
            .role
            .as_deref()
            .map(Role::parse)
            .unwrap_or(Role::User);
        Some(Identity::new(user_id.clone(), username.clone(), role))
    }
}

/// Stored user document (collection `users`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id.clone(), self.username.clone(), self.role.clone())
    }
}

/// Revoked token (collection `tokenBlacklist`). The token itself is stored
/// as a SHA-256 hex digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub token_hash: String,
    pub revoked_at: DateTime<Utc>,
    /// `None` for tokens that never expire; such entries are never purged.
    pub expires_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
