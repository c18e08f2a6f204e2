//! User queries against the document store.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::AuthError;
use crate::models::auth::{Identity, Role, UserRecord};
use crate::store::{DocumentStore, StoreError, collections, filter_eq, find_one, from_document, to_document};
use crate::uuid::new_document_id;

/// The one username whose role is pinned to `admin`.
pub const ADMIN_USERNAME: &str = "admin";

/// Fetch a user by username.
pub async fn find_user_by_username(
    store: &dyn DocumentStore,
    username: &str,
) -> Result<Option<UserRecord>, AuthError> {
    let doc = find_one(store, collections::USERS, &filter_eq("username", username)).await?;
    Ok(doc.map(from_document).transpose()?)
}

/// Check whether a username is already registered.
pub async fn username_exists(store: &dyn DocumentStore, username: &str) -> Result<bool, AuthError> {
    Ok(store
        .count(collections::USERS, &filter_eq("username", username))
        .await?
        > 0)
}

/// Create a new user. The literal `admin` username always gets the admin role.
pub async fn create_user(
    store: &dyn DocumentStore,
    username: &str,
    password_hash: &str,
    role: Role,
) -> Result<UserRecord, AuthError> {
    let role = if username == ADMIN_USERNAME { Role::Admin } else { role };
    let user = UserRecord {
        id: new_document_id(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role,
        created_at: Utc::now(),
    };
    match store.insert_one(collections::USERS, to_document(&user)?).await {
        Ok(_) => Ok(user),
        Err(StoreError::Duplicate(_)) => Err(AuthError::Conflict(format!(
            "Username '{username}' is already taken"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Pin the admin role on the `admin` account.
///
/// Returns the identity with the corrected role. Any other identity is
/// returned unchanged.
pub async fn ensure_admin_role(
    store: &dyn DocumentStore,
    identity: Identity,
) -> Result<Identity, AuthError> {
    if identity.username != ADMIN_USERNAME || identity.role.is_admin() {
        return Ok(identity);
    }
    let mut patch = crate::store::Document::new();
    patch.insert("role".into(), Value::String(Role::Admin.as_str().into()));
    let updated = store
        .update_many(collections::USERS, &filter_eq("username", ADMIN_USERNAME), patch)
        .await?;
    info!(previous = %identity.role, updated, "restored admin role");
    Ok(Identity {
        role: Role::Admin,
        ..identity
    })
}
