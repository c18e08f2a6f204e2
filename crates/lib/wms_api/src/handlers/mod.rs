//! Request handlers.

pub mod auth;
pub mod fallback;
pub mod health;
pub mod import;
pub mod processes;
