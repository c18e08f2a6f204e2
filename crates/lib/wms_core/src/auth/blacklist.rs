//! Token revocation list.
//!
//! Entries are written at logout and stay meaningful until `expiresAt`, after
//! which they are ignored and eventually purged. Tokens without an expiry get
//! an entry without one, which stays for good. The validator in
//! [`super::token`] does not consult this list; callers opt in to the check.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::AuthError;
use super::jwt::verify_token;
use crate::models::auth::{BlacklistEntry, Identity};
use crate::store::{
    Document, DocumentStore, collections, filter_eq, from_document, to_document,
};

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// When a revocation for `token` may be forgotten: the JWT's own `exp`.
/// Tokens that carry no verifiable expiry, such as simplified tokens, get
/// `None` and are remembered indefinitely.
pub fn revocation_expiry(token: &str, secret: &[u8]) -> Option<DateTime<Utc>> {
    verify_token(token, secret)
        .and_then(|claims| claims.exp)
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// Request details recorded with a revocation.
#[derive(Debug, Clone, Default)]
pub struct RevocationContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Record `token` as revoked. Revoking twice keeps the first entry.
pub async fn revoke(
    store: &dyn DocumentStore,
    token: &str,
    identity: Option<&Identity>,
    context: RevocationContext,
    expires_at: Option<DateTime<Utc>>,
) -> Result<BlacklistEntry, AuthError> {
    let token_hash = hash_token(token);
    if let Some(existing) = find_entry(store, &token_hash).await? {
        return Ok(existing);
    }
    let entry = BlacklistEntry {
        token_hash,
        revoked_at: Utc::now(),
        expires_at,
        user_id: identity.map(|i| i.user_id.clone()),
        user_agent: context.user_agent,
        ip_address: context.ip_address,
    };
    store
        .insert_one(collections::TOKEN_BLACKLIST, to_document(&entry)?)
        .await?;
    debug!(user_id = ?entry.user_id, "token revoked");
    Ok(entry)
}

/// Whether `token` has an unexpired revocation entry.
pub async fn is_revoked(store: &dyn DocumentStore, token: &str) -> Result<bool, AuthError> {
    let entry = find_entry(store, &hash_token(token)).await?;
    let now = Utc::now();
    Ok(entry.is_some_and(|e| e.expires_at.is_none_or(|at| at > now)))
}

/// Delete entries whose `expiresAt` has passed. Entries without an expiry are
/// kept. Returns how many were removed.
pub async fn purge_expired(store: &dyn DocumentStore) -> Result<u64, AuthError> {
    let now = Utc::now();
    let entries = store
        .find(collections::TOKEN_BLACKLIST, &Document::new())
        .await?;
    let mut removed = 0;
    for doc in entries {
        let entry: BlacklistEntry = from_document(doc)?;
        if entry.expires_at.is_some_and(|at| at <= now) {
            removed += store
                .delete_many(
                    collections::TOKEN_BLACKLIST,
                    &filter_eq("tokenHash", entry.token_hash),
                )
                .await?;
        }
    }
    Ok(removed)
}

async fn find_entry(
    store: &dyn DocumentStore,
    token_hash: &str,
) -> Result<Option<BlacklistEntry>, AuthError> {
    let doc = crate::store::find_one(
        store,
        collections::TOKEN_BLACKLIST,
        &filter_eq("tokenHash", token_hash),
    )
    .await?;
    Ok(doc.map(from_document).transpose()?)
}
