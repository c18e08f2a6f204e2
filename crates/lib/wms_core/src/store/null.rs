//! Degraded store used when no database is reachable in development mode.
//!
//! Reads answer empty, writes report zero affected documents.

use async_trait::async_trait;

use super::{ConnectionState, Document, DocumentStore, StoreResult, assign_id};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl DocumentStore for NullStore {
    fn state(&self) -> ConnectionState {
        ConnectionState::Connected
    }

    async fn close(&self) {}

    async fn find(&self, _collection: &str, _filter: &Document) -> StoreResult<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn count(&self, _collection: &str, _filter: &Document) -> StoreResult<u64> {
        Ok(0)
    }

    async fn insert_one(&self, _collection: &str, mut doc: Document) -> StoreResult<Document> {
        assign_id(&mut doc);
        Ok(doc)
    }

    async fn insert_many(&self, _collection: &str, _docs: Vec<Document>) -> StoreResult<u64> {
        Ok(0)
    }

    async fn update_many(
        &self,
        _collection: &str,
        _filter: &Document,
        _patch: Document,
    ) -> StoreResult<u64> {
        Ok(0)
    }

    async fn delete_many(&self, _collection: &str, _filter: &Document) -> StoreResult<u64> {
        Ok(0)
    }

    async fn drop_collection(&self, _collection: &str) -> StoreResult<u64> {
        Ok(0)
    }

    async fn upsert_all_by_key(
        &self,
        _collection: &str,
        _key: &str,
        _docs: Vec<Document>,
    ) -> StoreResult<u64> {
        Ok(0)
    }
}
