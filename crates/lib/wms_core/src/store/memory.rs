//! In-process document store.
//!
//! Backs tests and embedded use. Connection state can be forced so callers
//! can exercise reconnect paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    ConnectionState, DOCUMENT_ID, Document, DocumentStore, StoreError, StoreResult, assign_id,
    key_string, matches,
};

/// Document store held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    state: AtomicU8,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            state: AtomicU8::new(encode_state(ConnectionState::Connected)),
        }
    }

    /// Force the reported connection state.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(encode_state(state), Ordering::SeqCst);
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Disconnected => 0,
        ConnectionState::Connected => 1,
        ConnectionState::Connecting => 2,
        ConnectionState::Disconnecting => 3,
    }
}

fn decode_state(raw: u8) -> ConnectionState {
    match raw {
        1 => ConnectionState::Connected,
        2 => ConnectionState::Connecting,
        3 => ConnectionState::Disconnecting,
        _ => ConnectionState::Disconnected,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn state(&self) -> ConnectionState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    async fn close(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    async fn find(&self, collection: &str, filter: &Document) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| matches(doc, filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        assign_id(&mut doc);
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();
        let inserted = docs.len() as u64;
        for mut doc in docs {
            assign_id(&mut doc);
            target.push(doc);
        }
        Ok(inserted)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        patch: Document,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0;
        for doc in docs.iter_mut().filter(|doc| matches(doc, filter)) {
            for (key, value) in &patch {
                doc.insert(key.clone(), value.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_many(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches(doc, filter));
        Ok((before - docs.len()) as u64)
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .remove(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn upsert_all_by_key(
        &self,
        collection: &str,
        key: &str,
        docs: Vec<Document>,
    ) -> StoreResult<u64> {
        // Validate every key before touching the collection so a bad document
        // leaves nothing half-written.
        let mut keyed = Vec::with_capacity(docs.len());
        for doc in docs {
            let value = key_string(&doc, key)
                .ok_or_else(|| StoreError::Operation(format!("document missing key '{key}'")))?;
            keyed.push((value, doc));
        }

        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();
        let written = keyed.len() as u64;
        for (value, mut doc) in keyed {
            match target
                .iter_mut()
                .find(|existing| key_string(existing, key).as_deref() == Some(value.as_str()))
            {
                Some(existing) => {
                    if let Some(id) = existing.get(DOCUMENT_ID).cloned() {
                        doc.insert(DOCUMENT_ID.to_string(), id);
                    }
                    *existing = doc;
                }
                None => {
                    assign_id(&mut doc);
                    target.push(doc);
                }
            }
        }
        Ok(written)
    }
}
