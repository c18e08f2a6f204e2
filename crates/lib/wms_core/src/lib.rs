//! # wms_core
//!
//! Core domain logic for the WMS training backend: bearer-token validation,
//! the document store abstraction and its connection pool, the Excel bulk
//! import reconciler and the incremental process save path.

pub mod auth;
pub mod db;
pub mod import;
pub mod models;
pub mod presentation;
pub mod processes;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
