//! Child-to-process association.
//!
//! Child rows (steps, benefits, before/after items) name their parent by
//! `processId`. Matchers are tried in order of preference across all
//! processes; a later matcher only runs when no process satisfied an earlier
//! one.

/// Keys a process can be referenced by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessKey {
    /// The external `id` from the sheet.
    pub id: String,
    /// A database identifier carried in the sheet's `_id` column, if any.
    pub database_id: Option<String>,
}

impl ProcessKey {
    pub fn new(id: impl Into<String>, database_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            database_id,
        }
    }
}

/// `processId` equals the process `id`.
pub fn match_by_exact_id(process_id: &str, key: &ProcessKey) -> bool {
    process_id == key.id
}

/// `processId` equals the process's database identifier.
pub fn match_by_database_id(process_id: &str, key: &ProcessKey) -> bool {
    key.database_id.as_deref() == Some(process_id)
}

/// One id is a prefix of the other. Last resort for ids truncated by
/// spreadsheet editing.
pub fn match_by_prefix(process_id: &str, key: &ProcessKey) -> bool {
    !process_id.is_empty()
        && !key.id.is_empty()
        && (key.id.starts_with(process_id) || process_id.starts_with(key.id.as_str()))
}

type Matcher = fn(&str, &ProcessKey) -> bool;

const MATCHERS: [Matcher; 3] = [match_by_exact_id, match_by_database_id, match_by_prefix];

/// Index of the process a child with `process_id` belongs to.
pub fn find_parent(process_id: &str, processes: &[ProcessKey]) -> Option<usize> {
    if process_id.trim().is_empty() {
        return None;
    }
    MATCHERS
        .iter()
        .find_map(|matcher| processes.iter().position(|key| matcher(process_id, key)))
}
