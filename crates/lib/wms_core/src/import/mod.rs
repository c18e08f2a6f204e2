//! Excel bulk import.
//!
//! A workbook is validated in full before the store is touched; only then is
//! the target collection replaced wholesale (delete, verify, insert, verify).

pub mod matching;
pub mod reconciler;
pub mod workbook;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub use reconciler::{bulk_replace, build_presentations, build_processes, import_workbook};
pub use workbook::{Row, Sheet, Workbook};

use crate::store::StoreError;

/// What a workbook replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Processes,
    Presentations,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Processes => "processes",
            EntityKind::Presentations => "presentations",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processes" => Ok(EntityKind::Processes),
            "presentations" => Ok(EntityKind::Presentations),
            other => Err(ImportError::UnsupportedEntity(other.to_string())),
        }
    }
}

/// Result of a completed import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    pub count: u64,
    pub message: String,
}

/// Import failures.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported import type: {0}")]
    UnsupportedEntity(String),

    #[error("Workbook is missing required sheet '{0}'")]
    MissingSheet(&'static str),

    #[error("Unreadable workbook: {0}")]
    Workbook(String),

    /// Referential-integrity or required-field failure. Raised before any
    /// write.
    #[error("{message}")]
    Validation {
        message: String,
        offending_rows: usize,
    },

    #[error("Collection '{collection}' still holds {remaining} documents after delete")]
    ReplaceIncomplete {
        collection: &'static str,
        remaining: u64,
    },

    #[error("Expected {expected} documents in '{collection}' after insert, found {actual}")]
    CountMismatch {
        collection: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
