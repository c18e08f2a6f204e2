//! API server configuration.

use std::fmt;
use std::str::FromStr;

/// Value of `APP_ENV` that turns on development mode.
pub const DEVELOPMENT_ENV: &str = "development";

/// Which token format login and registration mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenFormat {
    #[default]
    Jwt,
    Simplified,
}

impl FromStr for TokenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jwt" => Ok(TokenFormat::Jwt),
            "simplified" => Ok(TokenFormat::Simplified),
            other => Err(format!("unknown token format '{other}'")),
        }
    }
}

impl fmt::Display for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenFormat::Jwt => "jwt",
            TokenFormat::Simplified => "simplified",
        })
    }
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Development mode: dev-fallback tokens, degraded database handles and
    /// error diagnostics.
    pub development: bool,
    /// Reject tokens found on the revocation list.
    pub enforce_blacklist: bool,
    pub token_format: TokenFormat,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("development", &self.development)
            .field("enforce_blacklist", &self.enforce_blacklist)
            .field("token_format", &self.token_format)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Configuration for tests and embedding: no environment lookups.
    pub fn for_secret(jwt_secret: impl Into<String>, development: bool) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            jwt_secret: jwt_secret.into(),
            development,
            enforce_blacklist: false,
            token_format: TokenFormat::Jwt,
        }
    }
}

/// `1`, `true`, `yes` and `on` (any case) are truthy.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
