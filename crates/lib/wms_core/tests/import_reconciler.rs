//! End-to-end workbook imports against the in-memory store.

use async_trait::async_trait;
use serde_json::{Value, json};
use wms_core::import::{EntityKind, ImportError, Sheet, Workbook, bulk_replace, import_workbook};
use wms_core::store::{
    ConnectionState, Document, DocumentStore, MemoryStore, StoreResult, collections, filter_eq,
    to_document,
};

fn rows(values: Vec<Value>) -> Vec<Document> {
    values.iter().map(|v| to_document(v).unwrap()).collect()
}

fn sheet(name: &str, values: Vec<Value>) -> Sheet {
    Sheet {
        name: name.into(),
        rows: rows(values),
    }
}

async fn seed_process(store: &MemoryStore, id: &str) {
    store
        .insert_one(
            collections::PROCESSES,
            to_document(&json!({"id": id, "title": "Seeded", "steps": []})).unwrap(),
        )
        .await
        .unwrap();
}

fn two_process_workbook() -> Workbook {
    Workbook::new(vec![
        sheet(
            "Processes",
            vec![
                json!({"id": "RCV-2024-001", "title": "Receiving", "category": "Inbound"}),
                json!({"id": "PCK-2024-002", "name": "Picking"}),
            ],
        ),
        sheet(
            "Steps",
            vec![
                json!({"processId": "RCV-2024-001", "title": "Unload", "order": 1}),
                json!({"processId": "RCV-2024-001", "title": "Check in", "order": 2}),
                json!({"processId": "PCK-2024-002", "title": "Scan tote"}),
            ],
        ),
        sheet(
            "BeforeAfter",
            vec![json!({"processId": "PCK-2024", "before": "Paper lists", "after": "Scanners"})],
        ),
    ])
}

#[tokio::test]
async fn invalid_step_leaves_collection_untouched() {
    let store = MemoryStore::new();
    seed_process(&store, "SEEDED-1").await;

    let workbook = Workbook::new(vec![
        sheet("Processes", vec![json!({"id": "NEW-1", "title": "New"})]),
        sheet(
            "Steps",
            vec![
                json!({"processId": "NEW-1", "title": "ok"}),
                json!({"processId": "GHOST", "title": "orphan"}),
            ],
        ),
    ]);

    let err = import_workbook(&store, &workbook, EntityKind::Processes)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation { offending_rows: 1, .. }));

    let remaining = store
        .find(collections::PROCESSES, &Document::new())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], json!("SEEDED-1"));
}

#[tokio::test]
async fn valid_workbook_replaces_collection() {
    let store = MemoryStore::new();
    seed_process(&store, "OLD-1").await;
    seed_process(&store, "OLD-2").await;
    seed_process(&store, "OLD-3").await;

    let summary = import_workbook(&store, &two_process_workbook(), EntityKind::Processes)
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.count, 2);

    assert_eq!(
        store
            .count(collections::PROCESSES, &Document::new())
            .await
            .unwrap(),
        2
    );

    let receiving = store
        .find(collections::PROCESSES, &filter_eq("id", "RCV-2024-001"))
        .await
        .unwrap();
    assert_eq!(receiving.len(), 1);
    assert_eq!(receiving[0]["steps"].as_array().unwrap().len(), 2);
    assert_eq!(receiving[0]["name"], json!("Receiving"));

    let picking = store
        .find(collections::PROCESSES, &filter_eq("id", "PCK-2024-002"))
        .await
        .unwrap();
    assert_eq!(picking[0]["steps"].as_array().unwrap().len(), 1);
    assert_eq!(picking[0]["title"], json!("Picking"));
    assert_eq!(picking[0]["beforeAfter"][0]["after"], json!("Scanners"));

    assert_eq!(
        store
            .count(collections::PROCESSES, &filter_eq("id", "OLD-1"))
            .await
            .unwrap(),
        0
    );
}

/// Delete reports success but leaves every document in place.
struct StubbornStore {
    inner: MemoryStore,
    drop_works: bool,
}

#[async_trait]
impl DocumentStore for StubbornStore {
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
    async fn delete_many(&self, _c: &str, _f: &Document) -> StoreResult<u64> {
        Ok(0)
    }
    async fn drop_collection(&self, c: &str) -> StoreResult<u64> {
        if self.drop_works {
            self.inner.drop_collection(c).await
        } else {
            Ok(0)
        }
    }
    async fn upsert_all_by_key(&self, c: &str, k: &str, d: Vec<Document>) -> StoreResult<u64> {
        self.inner.upsert_all_by_key(c, k, d).await
    }
}

#[tokio::test]
async fn stragglers_are_dropped() {
    let store = StubbornStore {
        inner: MemoryStore::new(),
        drop_works: true,
    };
    seed_process(&store.inner, "STRAGGLER").await;

    let summary = import_workbook(&store, &two_process_workbook(), EntityKind::Processes)
        .await
        .unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(
        store
            .count(collections::PROCESSES, &filter_eq("id", "STRAGGLER"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn surviving_stragglers_abort_before_insert() {
    let store = StubbornStore {
        inner: MemoryStore::new(),
        drop_works: false,
    };
    seed_process(&store.inner, "STRAGGLER").await;

    let err = bulk_replace(&store, collections::PROCESSES, rows(vec![json!({"id": "N"})]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::ReplaceIncomplete { remaining: 1, .. }
    ));
    assert_eq!(
        store
            .count(collections::PROCESSES, &filter_eq("id", "N"))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn presentations_import_derives_viewer_fields() {
    let store = MemoryStore::new();
    let workbook = Workbook::new(vec![sheet(
        "Presentations",
        vec![
            json!({"id": "DECK-1", "title": "Forklift basics", "url": "https://drive.google.com/file/d/F1/view"}),
            json!({"id": "DECK-2", "title": "Slides", "url": "https://docs.google.com/presentation/d/S2/edit"}),
        ],
    )]);

    let summary = import_workbook(&store, &workbook, EntityKind::Presentations)
        .await
        .unwrap();
    assert_eq!(summary.count, 2);

    let deck = store
        .find(collections::PRESENTATIONS, &filter_eq("id", "DECK-1"))
        .await
        .unwrap();
    assert_eq!(deck[0]["sourceType"], json!("gdrive"));
    assert_eq!(
        deck[0]["directUrl"],
        json!("https://drive.google.com/uc?export=download&id=F1")
    );

    let slides = store
        .find(collections::PRESENTATIONS, &filter_eq("id", "DECK-2"))
        .await
        .unwrap();
    assert_eq!(slides[0]["fileType"], json!("pptx"));
    assert_eq!(
        slides[0]["directUrl"],
        json!("https://docs.google.com/presentation/d/S2/export/pptx")
    );
}
