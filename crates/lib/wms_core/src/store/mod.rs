//! Document store abstraction.
//!
//! Collections hold JSON objects. Every stored document carries a
//! store-assigned `_id`; domain keys such as a process `id` live beside it
//! and are never rewritten by the store.

pub mod memory;
pub mod null;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use null::NullStore;
pub use postgres::PgStore;

use crate::uuid::new_document_id;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Field holding the store-assigned identifier.
pub const DOCUMENT_ID: &str = "_id";

/// Collection names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PROCESSES: &str = "processes";
    pub const PRESENTATIONS: &str = "presentations";
    pub const TOKEN_BLACKLIST: &str = "tokenBlacklist";
}

/// Postgres SQLSTATE for `serialization_failure`.
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// Postgres SQLSTATE for `deadlock_detected`.
const PG_DEADLOCK_DETECTED: &str = "40P01";
/// Postgres SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Connection readiness as reported by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Labels a driver attaches to a failed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionLabel {
    TransientTransactionError,
    UnknownTransactionCommitResult,
}

/// Errors raised by document stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Transaction failed: {message}")]
    Transaction {
        message: String,
        labels: Vec<TransactionLabel>,
    },

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::WriteConflict(_) => true,
            StoreError::Transaction { labels, .. } => !labels.is_empty(),
            StoreError::Sql(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some(PG_SERIALIZATION_FAILURE) | Some(PG_DEADLOCK_DETECTED)
            ),
            _ => false,
        }
    }

    /// Map a driver error, lifting unique violations into `Duplicate`.
    pub(crate) fn from_sql(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && db.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
        {
            return StoreError::Duplicate(db.message().to_string());
        }
        StoreError::Sql(err)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Asynchronous document store.
///
/// Filters are equality matches on top-level fields; an empty filter matches
/// every document in the collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current readiness of the underlying connection.
    fn state(&self) -> ConnectionState;

    /// Release the underlying connection.
    async fn close(&self);

    async fn find(&self, collection: &str, filter: &Document) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64>;

    /// Insert one document, returning it with its `_id`.
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<u64>;

    /// Merge `patch` into every matching document.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        patch: Document,
    ) -> StoreResult<u64>;

    async fn delete_many(&self, collection: &str, filter: &Document) -> StoreResult<u64>;

    /// Remove every document of a collection below the document API.
    async fn drop_collection(&self, collection: &str) -> StoreResult<u64>;

    /// Replace-or-insert each document keyed by `key`, all inside one
    /// transaction. Existing documents keep their `_id`.
    async fn upsert_all_by_key(
        &self,
        collection: &str,
        key: &str,
        docs: Vec<Document>,
    ) -> StoreResult<u64>;
}

/// First document matching `filter`.
pub async fn find_one(
    store: &dyn DocumentStore,
    collection: &str,
    filter: &Document,
) -> StoreResult<Option<Document>> {
    Ok(store.find(collection, filter).await?.into_iter().next())
}

/// Single-field equality filter.
pub fn filter_eq(key: &str, value: impl Into<Value>) -> Document {
    let mut filter = Document::new();
    filter.insert(key.to_string(), value.into());
    filter
}

/// Serialize a value into a document.
pub fn to_document<T: serde::Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Operation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a document, ignoring store fields the target does not name.
pub fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Give `doc` an `_id` unless it already has one; returns the identifier.
pub(crate) fn assign_id(doc: &mut Document) -> String {
    match doc.get(DOCUMENT_ID).and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = new_document_id();
            doc.insert(DOCUMENT_ID.to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// Equality match of every filter field against `doc`.
pub(crate) fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

/// String form of a key field, accepting numbers.
pub(crate) fn key_string(doc: &Document, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transient_classification() {
        assert!(StoreError::WriteConflict("112".into()).is_transient());
        assert!(
            StoreError::Transaction {
                message: "commit unknown".into(),
                labels: vec![TransactionLabel::UnknownTransactionCommitResult],
            }
            .is_transient()
        );
        assert!(
            !StoreError::Transaction {
                message: "aborted".into(),
                labels: vec![],
            }
            .is_transient()
        );
        assert!(!StoreError::Operation("bad".into()).is_transient());
    }

    #[test]
    fn assign_id_keeps_existing() {
        let mut doc = filter_eq(DOCUMENT_ID, "fixed");
        assert_eq!(assign_id(&mut doc), "fixed");

        let mut fresh = Document::new();
        let id = assign_id(&mut fresh);
        assert_eq!(fresh[DOCUMENT_ID], json!(id));
    }

    #[test]
    fn matches_requires_every_field() {
        let doc = to_document(&json!({"a": 1, "b": "x"})).unwrap();
        assert!(matches(&doc, &Document::new()));
        assert!(matches(&doc, &filter_eq("a", 1)));
        assert!(!matches(&doc, &filter_eq("b", "y")));
        assert!(!matches(&doc, &filter_eq("c", 1)));
    }
}
