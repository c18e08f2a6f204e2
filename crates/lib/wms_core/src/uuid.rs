// Document identifiers.
//
// Stores assign `_id` with UUIDv7 so insertion order survives a sort on the
// identifier. External keys (a process `id` from a workbook) are never
// generated here.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// A fresh document identifier as a string.
pub fn new_document_id() -> String {
    uuidv7().to_string()
}
