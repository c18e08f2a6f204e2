//! PostgreSQL-backed document store.
//!
//! All collections share one `documents` table; bodies are `jsonb` and
//! equality filters use containment (`body @> filter`).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    ConnectionState, DOCUMENT_ID, Document, DocumentStore, StoreError, StoreResult, assign_id,
    key_string,
};

/// Document store over a sqlx Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn filter_json(filter: &Document) -> Json<Value> {
    Json(Value::Object(filter.clone()))
}

fn into_documents(rows: Vec<Json<Value>>) -> Vec<Document> {
    rows.into_iter()
        .filter_map(|Json(value)| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl DocumentStore for PgStore {
    fn state(&self) -> ConnectionState {
        if self.pool.is_closed() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn find(&self, collection: &str, filter: &Document) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT body FROM documents \
             WHERE collection = $1 AND body @> $2 \
             ORDER BY created_at, doc_id",
        )
        .bind(collection)
        .bind(filter_json(filter))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sql)?;
        Ok(into_documents(rows))
    }

    async fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND body @> $2",
        )
        .bind(collection)
        .bind(filter_json(filter))
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sql)?;
        Ok(count.max(0) as u64)
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        let id = assign_id(&mut doc);
        sqlx::query("INSERT INTO documents (collection, doc_id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(Value::Object(doc.clone())))
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sql)?;
        Ok(doc)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sql)?;
        let mut inserted = 0;
        for mut doc in docs {
            let id = assign_id(&mut doc);
            sqlx::query("INSERT INTO documents (collection, doc_id, body) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(&id)
                .bind(Json(Value::Object(doc)))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sql)?;
            inserted += 1;
        }
        tx.commit().await.map_err(StoreError::from_sql)?;
        Ok(inserted)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        patch: Document,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE documents SET body = body || $3 \
             WHERE collection = $1 AND body @> $2",
        )
        .bind(collection)
        .bind(filter_json(filter))
        .bind(Json(Value::Object(patch)))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sql)?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND body @> $2")
            .bind(collection)
            .bind(filter_json(filter))
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sql)?;
        Ok(result.rows_affected())
    }

    async fn drop_collection(&self, collection: &str) -> StoreResult<u64> {
        // Exclusive lock so concurrent writers cannot slip rows in between.
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sql)?;
        sqlx::query("LOCK TABLE documents IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sql)?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sql)?;
        tx.commit().await.map_err(StoreError::from_sql)?;
        Ok(result.rows_affected())
    }

    async fn upsert_all_by_key(
        &self,
        collection: &str,
        key: &str,
        docs: Vec<Document>,
    ) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sql)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sql)?;

        let mut written = 0;
        for mut doc in docs {
            let value = key_string(&doc, key)
                .ok_or_else(|| StoreError::Operation(format!("document missing key '{key}'")))?;

            let existing = sqlx::query_scalar::<_, String>(
                "SELECT doc_id FROM documents \
                 WHERE collection = $1 AND body ->> $2 = $3 \
                 FOR UPDATE",
            )
            .bind(collection)
            .bind(key)
            .bind(&value)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from_sql)?;

            match existing {
                Some(doc_id) => {
                    doc.insert(DOCUMENT_ID.to_string(), Value::String(doc_id.clone()));
                    sqlx::query(
                        "UPDATE documents SET body = $3 WHERE collection = $1 AND doc_id = $2",
                    )
                    .bind(collection)
                    .bind(&doc_id)
                    .bind(Json(Value::Object(doc)))
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::from_sql)?;
                }
                None => {
                    let doc_id = assign_id(&mut doc);
                    sqlx::query(
                        "INSERT INTO documents (collection, doc_id, body) VALUES ($1, $2, $3)",
                    )
                    .bind(collection)
                    .bind(&doc_id)
                    .bind(Json(Value::Object(doc)))
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::from_sql)?;
                }
            }
            written += 1;
        }

        tx.commit().await.map_err(StoreError::from_sql)?;
        Ok(written)
    }
}
