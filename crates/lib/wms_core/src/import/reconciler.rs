//! Workbook → documents, and the all-or-nothing collection replace.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::matching::{ProcessKey, find_parent};
use super::workbook::{Row, Workbook, integer, raw_text, text, text_any};
use super::{EntityKind, ImportError, ImportSummary};
use crate::presentation::{direct_url, file_type, looks_local, source_type, viewer_url};
use crate::store::{DOCUMENT_ID, Document, DocumentStore, collections};
use crate::uuid::new_document_id;

const PROCESSES_SHEET: &str = "Processes";
const STEPS_SHEET: &str = "Steps";
const BENEFITS_SHEET: &str = "Benefits";
const BEFORE_AFTER_SHEET: &str = "BeforeAfter";
const PRESENTATIONS_SHEET: &str = "Presentations";

/// Status given to steps whose row leaves it blank.
const DEFAULT_STEP_STATUS: &str = "pending";

/// Parse, validate and replace the target collection.
pub async fn import_workbook(
    store: &dyn DocumentStore,
    workbook: &Workbook,
    kind: EntityKind,
) -> Result<ImportSummary, ImportError> {
    let (collection, docs) = match kind {
        EntityKind::Processes => (collections::PROCESSES, build_processes(workbook)?),
        EntityKind::Presentations => (collections::PRESENTATIONS, build_presentations(workbook)?),
    };
    let count = bulk_replace(store, collection, docs).await?;
    info!(%kind, count, "workbook imported");
    Ok(ImportSummary {
        success: true,
        count,
        message: format!("Imported {count} {kind}"),
    })
}

/// Build process documents with embedded steps, benefits and before/after
/// items. Fails without side effects when any row breaks referential
/// integrity.
pub fn build_processes(workbook: &Workbook) -> Result<Vec<Document>, ImportError> {
    let processes = workbook
        .sheet(PROCESSES_SHEET)
        .ok_or(ImportError::MissingSheet(PROCESSES_SHEET))?;
    let steps = workbook
        .sheet(STEPS_SHEET)
        .ok_or(ImportError::MissingSheet(STEPS_SHEET))?;
    let benefits = optional_rows(workbook, BENEFITS_SHEET);
    let before_after = optional_rows(workbook, BEFORE_AFTER_SHEET);

    validate_process_rows(&processes.rows, &steps.rows)?;

    let keys: Vec<ProcessKey> = processes
        .rows
        .iter()
        .map(|row| ProcessKey::new(raw_text(row, "id").unwrap_or_default(), raw_text(row, DOCUMENT_ID)))
        .collect();

    let step_groups = group_children(&steps.rows, &keys, STEPS_SHEET);
    let benefit_groups = group_children(benefits, &keys, BENEFITS_SHEET);
    let before_after_groups = group_children(before_after, &keys, BEFORE_AFTER_SHEET);

    let imported_at = Utc::now().to_rfc3339();
    let docs = processes
        .rows
        .iter()
        .zip(&keys)
        .enumerate()
        .map(|(index, (row, key))| {
            let mut doc = carry_over(row);
            let (title, name) = cross_fill(text(row, "title"), text(row, "name"));

            let mut steps: Vec<Document> = step_groups[index]
                .iter()
                .enumerate()
                .map(|(i, step)| normalize_step(step, i, &key.id))
                .collect();
            steps.sort_by_key(|step| step.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX));

            let benefits = normalize_items(&benefit_groups[index], &key.id, "benefit");
            let before_after = normalize_items(&before_after_groups[index], &key.id, "before-after");

            doc.insert("id".into(), Value::String(key.id.clone()));
            doc.insert("title".into(), Value::String(title));
            doc.insert("name".into(), Value::String(name));
            doc.insert(
                "description".into(),
                Value::String(text(row, "description").unwrap_or_default()),
            );
            if let Some(category) = text(row, "category") {
                doc.insert("category".into(), Value::String(category));
            }
            match text(row, "userId") {
                Some(owner) => {
                    doc.insert("userId".into(), Value::String(owner));
                }
                None => {
                    doc.remove("userId");
                }
            }
            doc.insert("steps".into(), documents(steps));
            doc.insert("benefits".into(), documents(benefits));
            doc.insert("beforeAfter".into(), documents(before_after));
            doc.insert("importedAt".into(), Value::String(imported_at.clone()));
            doc
        })
        .collect();
    Ok(docs)
}

/// Build presentation documents with derived source and URL fields.
pub fn build_presentations(workbook: &Workbook) -> Result<Vec<Document>, ImportError> {
    let sheet = workbook
        .sheet(PRESENTATIONS_SHEET)
        .ok_or(ImportError::MissingSheet(PRESENTATIONS_SHEET))?;

    let missing_url = sheet.rows.iter().filter(|row| text(row, "url").is_none()).count();
    if missing_url > 0 {
        return Err(ImportError::Validation {
            message: format!("{missing_url} presentation row(s) have no url"),
            offending_rows: missing_url,
        });
    }

    let imported_at = Utc::now().to_rfc3339();
    Ok(sheet
        .rows
        .iter()
        .map(|row| {
            let url = text(row, "url").unwrap_or_default();
            let is_local = flag(row, "isLocal").unwrap_or_else(|| looks_local(&url));
            let source = source_type(&url, is_local);
            let direct = direct_url(&url, source);
            let (title, name) = cross_fill(text(row, "title"), text(row, "name"));

            let mut doc = carry_over(row);
            doc.insert(
                "id".into(),
                Value::String(raw_text(row, "id").unwrap_or_else(new_document_id)),
            );
            doc.insert("title".into(), Value::String(title));
            doc.insert("name".into(), Value::String(name));
            doc.insert(
                "description".into(),
                Value::String(text(row, "description").unwrap_or_default()),
            );
            doc.insert("isLocal".into(), Value::Bool(is_local));
            doc.insert("fileType".into(), Value::String(file_type(&url, source)));
            doc.insert("sourceType".into(), serde_json::to_value(source).unwrap_or(Value::Null));
            doc.insert(
                "viewerUrl".into(),
                viewer_url(&direct, is_local).map(Value::String).unwrap_or(Value::Null),
            );
            doc.insert("directUrl".into(), Value::String(direct));
            doc.insert("url".into(), Value::String(url));
            doc.insert("importedAt".into(), Value::String(imported_at.clone()));
            doc
        })
        .collect())
}

/// Replace every document in `collection` with `docs`.
///
/// Deletes through the document API, falls back to dropping the collection
/// when stragglers remain, then inserts and checks the final count. There is
/// no transaction spanning delete and insert.
pub async fn bulk_replace(
    store: &dyn DocumentStore,
    collection: &'static str,
    docs: Vec<Document>,
) -> Result<u64, ImportError> {
    let everything = Document::new();

    let deleted = store.delete_many(collection, &everything).await?;
    let mut remaining = store.count(collection, &everything).await?;
    debug!(collection, deleted, remaining, "cleared collection");
    if remaining > 0 {
        warn!(collection, remaining, "documents survived delete, dropping collection");
        store.drop_collection(collection).await?;
        remaining = store.count(collection, &everything).await?;
    }
    if remaining > 0 {
        return Err(ImportError::ReplaceIncomplete {
            collection,
            remaining,
        });
    }

    let expected = docs.len() as u64;
    if expected > 0 {
        store.insert_many(collection, docs).await?;
    }
    let actual = store.count(collection, &everything).await?;
    if actual != expected {
        return Err(ImportError::CountMismatch {
            collection,
            expected,
            actual,
        });
    }
    Ok(actual)
}

fn optional_rows<'a>(workbook: &'a Workbook, name: &str) -> &'a [Row] {
    workbook
        .sheet(name)
        .map(|sheet| sheet.rows.as_slice())
        .unwrap_or(&[])
}

fn validate_process_rows(processes: &[Row], steps: &[Row]) -> Result<(), ImportError> {
    let missing_ids = processes.iter().filter(|row| text(row, "id").is_none()).count();
    if missing_ids > 0 {
        return Err(ImportError::Validation {
            message: format!("{missing_ids} process row(s) have no id"),
            offending_rows: missing_ids,
        });
    }

    let missing_parent = steps
        .iter()
        .filter(|row| text(row, "processId").is_none())
        .count();
    if missing_parent > 0 {
        return Err(ImportError::Validation {
            message: format!("{missing_parent} step row(s) have no processId"),
            offending_rows: missing_parent,
        });
    }

    let known: HashSet<String> = processes
        .iter()
        .filter_map(|row| raw_text(row, "id"))
        .collect();
    let orphans = steps
        .iter()
        .filter_map(|row| raw_text(row, "processId"))
        .filter(|process_id| !known.contains(process_id))
        .count();
    if orphans > 0 {
        return Err(ImportError::Validation {
            message: format!("{orphans} step row(s) reference a processId with no matching process"),
            offending_rows: orphans,
        });
    }
    Ok(())
}

/// Bucket child rows by parent process index. Rows with no parent are logged
/// and skipped.
fn group_children<'a>(rows: &'a [Row], keys: &[ProcessKey], sheet: &str) -> Vec<Vec<&'a Row>> {
    let mut groups = vec![Vec::new(); keys.len()];
    for row in rows {
        let parent = raw_text(row, "processId").and_then(|process_id| find_parent(&process_id, keys));
        match parent {
            Some(index) => groups[index].push(row),
            None => warn!(sheet, process_id = ?text(row, "processId"), "row matches no process"),
        }
    }
    groups
}

fn normalize_step(row: &Row, index: usize, process_id: &str) -> Document {
    let order = integer(row, "order").unwrap_or(index as i64 + 1);
    let mut step = Document::new();
    step.insert(
        "id".into(),
        Value::String(raw_text(row, "id").unwrap_or_else(|| format!("{process_id}-step-{order}"))),
    );
    step.insert(
        "title".into(),
        Value::String(text_any(row, &["title", "name"]).unwrap_or_default()),
    );
    step.insert(
        "description".into(),
        Value::String(text(row, "description").unwrap_or_default()),
    );
    step.insert("order".into(), Value::Number(order.into()));
    step.insert(
        "duration".into(),
        row.get("duration").cloned().unwrap_or(Value::Null),
    );
    step.insert(
        "status".into(),
        Value::String(text(row, "status").unwrap_or_else(|| DEFAULT_STEP_STATUS.to_string())),
    );
    step.insert(
        "videoUrl".into(),
        text_any(row, &["videoUrl", "video"])
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    step
}

/// Benefits and before/after rows keep their own columns, minus the
/// foreign key, plus a stable `id` and `order`.
fn normalize_items(rows: &[&Row], process_id: &str, label: &str) -> Vec<Document> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut item = carry_over(row);
            item.remove("processId");
            let order = integer(row, "order").unwrap_or(i as i64 + 1);
            item.insert(
                "id".into(),
                Value::String(
                    raw_text(row, "id").unwrap_or_else(|| format!("{process_id}-{label}-{}", i + 1)),
                ),
            );
            item.insert("order".into(), Value::Number(order.into()));
            item
        })
        .collect()
}

/// Copy a row without the store identifier, which the store reassigns.
fn carry_over(row: &Row) -> Document {
    let mut doc = row.clone();
    doc.remove(DOCUMENT_ID);
    doc
}

/// Fill a blank `title` from `name` and vice versa.
fn cross_fill(title: Option<String>, name: Option<String>) -> (String, String) {
    match (title, name) {
        (Some(title), Some(name)) => (title, name),
        (Some(title), None) => (title.clone(), title),
        (None, Some(name)) => (name.clone(), name),
        (None, None) => (String::new(), String::new()),
    }
}

fn flag(row: &Row, key: &str) -> Option<bool> {
    match row.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64() != Some(0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn documents(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}
