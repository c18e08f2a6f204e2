//! Incremental process saves.
//!
//! Saves go through `upsert_all_by_key` as one transaction. Transient
//! failures (write conflicts, labelled transaction errors) are retried with a
//! linear backoff; anything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::auth::Identity;
use crate::store::{Document, DocumentStore, StoreError, StoreResult, collections, key_string};

/// Attempts per save, the first included.
pub const TRANSACTION_ATTEMPTS: u32 = 3;

/// Backoff unit; attempt `n` waits `n` units before the next one.
pub const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Field identifying a process across saves and imports.
const PROCESS_KEY: &str = "id";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("{0}")]
    Validation(String),

    /// A non-admin tried to overwrite a global process or someone else's.
    #[error("{0}")]
    Forbidden(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Run `operation` until it succeeds, fails non-transiently or exhausts
/// [`TRANSACTION_ATTEMPTS`]. The closure receives the 1-based attempt number.
pub async fn retry_transient<T, F, Fut>(label: &str, mut operation: F) -> StoreResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < TRANSACTION_ATTEMPTS => {
                let delay = RETRY_BACKOFF_STEP * attempt;
                warn!(label, attempt, ?delay, error = %e, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Upsert `inputs` keyed by `id`.
///
/// Non-admin callers always own what they save and may only overwrite
/// processes they already own. Admins keep whatever owner the input names,
/// including none (a global process).
pub async fn save_processes(
    store: &dyn DocumentStore,
    identity: &Identity,
    inputs: Vec<Document>,
) -> Result<u64, SaveError> {
    let missing = inputs
        .iter()
        .filter(|doc| key_string(doc, PROCESS_KEY).is_none())
        .count();
    if missing > 0 {
        return Err(SaveError::Validation(format!(
            "{missing} process(es) have no id"
        )));
    }

    if !identity.role.is_admin() {
        ensure_owned(store, identity, &inputs).await?;
    }

    let docs: Vec<Document> = inputs
        .into_iter()
        .map(|mut doc| {
            if !identity.role.is_admin() {
                doc.insert("userId".into(), Value::String(identity.user_id.clone()));
            }
            doc
        })
        .collect();

    let saved = retry_transient("save_processes", |_| {
        store.upsert_all_by_key(collections::PROCESSES, PROCESS_KEY, docs.clone())
    })
    .await?;
    info!(user = %identity.username, saved, "processes saved");
    Ok(saved)
}

/// Owner of a stored process; `None` for a global one.
fn owner(doc: &Document) -> Option<&str> {
    match doc.get("userId") {
        Some(Value::String(owner)) if !owner.is_empty() => Some(owner.as_str()),
        _ => None,
    }
}

/// Reject inputs whose id already names a process the caller does not own.
async fn ensure_owned(
    store: &dyn DocumentStore,
    identity: &Identity,
    inputs: &[Document],
) -> Result<(), SaveError> {
    let existing = store.find(collections::PROCESSES, &Document::new()).await?;
    let mut foreign: Vec<String> = inputs
        .iter()
        .filter_map(|doc| key_string(doc, PROCESS_KEY))
        .filter(|id| {
            existing.iter().any(|stored| {
                key_string(stored, PROCESS_KEY).as_deref() == Some(id.as_str())
                    && owner(stored) != Some(identity.user_id.as_str())
            })
        })
        .collect();
    if foreign.is_empty() {
        return Ok(());
    }
    foreign.sort();
    foreign.dedup();
    warn!(user = %identity.username, ids = ?foreign, "save touches processes owned by others");
    Err(SaveError::Forbidden(format!(
        "Cannot modify processes you do not own: {}",
        foreign.join(", ")
    )))
}

/// Global processes plus the caller's own; admins see everything.
pub async fn visible_processes(
    store: &dyn DocumentStore,
    identity: &Identity,
) -> StoreResult<Vec<Document>> {
    let all = store.find(collections::PROCESSES, &Document::new()).await?;
    if identity.role.is_admin() {
        return Ok(all);
    }
    Ok(all
        .into_iter()
        .filter(|doc| match doc.get("userId") {
            None | Some(Value::Null) => true,
            Some(Value::String(owner)) => owner.is_empty() || *owner == identity.user_id,
            Some(_) => false,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;
    use crate::store::{ConnectionState, MemoryStore, filter_eq, to_document};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `upsert_all_by_key` with a canned error for the first calls.
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicU32,
        failures: u32,
        transient: bool,
    }

    impl FlakyStore {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                inner: MemoryStore::new(),
                calls: AtomicU32::new(0),
                failures,
                transient,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        fn state(&self) -> ConnectionState {
            self.inner.state()
        }
        async fn close(&self) {
            self.inner.close().await
        }
        async fn find(&self, c: &str, f: &Document) -> StoreResult<Vec<Document>> {
            self.inner.find(c, f).await
        }
        async fn count(&self, c: &str, f: &Document) -> StoreResult<u64> {
            self.inner.count(c, f).await
        }
        async fn insert_one(&self, c: &str, d: Document) -> StoreResult<Document> {
            self.inner.insert_one(c, d).await
        }
        async fn insert_many(&self, c: &str, d: Vec<Document>) -> StoreResult<u64> {
            self.inner.insert_many(c, d).await
        }
        async fn update_many(&self, c: &str, f: &Document, p: Document) -> StoreResult<u64> {
            self.inner.update_many(c, f, p).await
        }
        async fn delete_many(&self, c: &str, f: &Document) -> StoreResult<u64> {
            self.inner.delete_many(c, f).await
        }
        async fn drop_collection(&self, c: &str) -> StoreResult<u64> {
            self.inner.drop_collection(c).await
        }
        async fn upsert_all_by_key(&self, c: &str, k: &str, d: Vec<Document>) -> StoreResult<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(if self.transient {
                    StoreError::WriteConflict(format!("conflict on call {call}"))
                } else {
                    StoreError::Operation("validation failed".into())
                });
            }
            self.inner.upsert_all_by_key(c, k, d).await
        }
    }

    fn user() -> Identity {
        Identity::new("u-1", "alice", Role::User)
    }

    fn admin() -> Identity {
        Identity::new("a-1", "admin", Role::Admin)
    }

    fn process(value: serde_json::Value) -> Document {
        to_document(&value).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let store = FlakyStore::new(2, true);
        let started = tokio::time::Instant::now();

        let saved = save_processes(&store, &user(), vec![process(json!({"id": "P1"}))])
            .await
            .unwrap();

        assert_eq!(saved, 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_give_up_after_three_attempts() {
        let store = FlakyStore::new(5, true);
        let err = save_processes(&store, &user(), vec![process(json!({"id": "P1"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Store(StoreError::WriteConflict(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), TRANSACTION_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let store = FlakyStore::new(1, false);
        let err = save_processes(&store, &user(), vec![process(json!({"id": "P1"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Store(StoreError::Operation(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_id_is_rejected_before_any_write() {
        let store = FlakyStore::new(0, true);
        let err = save_processes(&store, &user(), vec![process(json!({"title": "x"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Validation(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_admins_own_what_they_save() {
        let store = MemoryStore::new();
        save_processes(
            &store,
            &user(),
            vec![process(json!({"id": "P1", "userId": "someone-else"}))],
        )
        .await
        .unwrap();
        let saved = store
            .find(collections::PROCESSES, &filter_eq("id", "P1"))
            .await
            .unwrap();
        assert_eq!(saved[0]["userId"], json!("u-1"));
    }

    #[tokio::test]
    async fn non_admins_cannot_take_over_foreign_processes() {
        let store = FlakyStore::new(0, true);
        save_processes(
            &store,
            &admin(),
            vec![
                process(json!({"id": "GLOBAL", "title": "Shared"})),
                process(json!({"id": "BOBS", "title": "Bob's", "userId": "u-2"})),
            ],
        )
        .await
        .unwrap();

        for id in ["GLOBAL", "BOBS"] {
            let err = save_processes(
                &store,
                &user(),
                vec![process(json!({"id": id, "title": "taken"}))],
            )
            .await
            .unwrap_err();
            assert!(matches!(err, SaveError::Forbidden(ref m) if m.contains(id)));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        let stored = store.find(collections::PROCESSES, &Document::new()).await.unwrap();
        let global = stored.iter().find(|d| d["id"] == json!("GLOBAL")).unwrap();
        assert_eq!(global["title"], json!("Shared"));
        assert!(global.get("userId").is_none());
        let bobs = stored.iter().find(|d| d["id"] == json!("BOBS")).unwrap();
        assert_eq!(bobs["userId"], json!("u-2"));
    }

    #[tokio::test]
    async fn owners_can_update_their_own_processes() {
        let store = MemoryStore::new();
        save_processes(&store, &user(), vec![process(json!({"id": "P1", "title": "v1"}))])
            .await
            .unwrap();
        save_processes(&store, &user(), vec![process(json!({"id": "P1", "title": "v2"}))])
            .await
            .unwrap();
        let saved = store
            .find(collections::PROCESSES, &filter_eq("id", "P1"))
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0]["title"], json!("v2"));
    }

    #[tokio::test]
    async fn visibility_is_global_plus_own() {
        let store = MemoryStore::new();
        save_processes(
            &store,
            &admin(),
            vec![
                process(json!({"id": "G"})),
                process(json!({"id": "MINE", "userId": "u-1"})),
                process(json!({"id": "THEIRS", "userId": "u-2"})),
            ],
        )
        .await
        .unwrap();

        let ids = |docs: Vec<Document>| {
            let mut ids: Vec<String> = docs
                .iter()
                .filter_map(|d| d["id"].as_str().map(str::to_string))
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(
            ids(visible_processes(&store, &user()).await.unwrap()),
            vec!["G", "MINE"]
        );
        assert_eq!(ids(visible_processes(&store, &admin()).await.unwrap()).len(), 3);
    }
}
