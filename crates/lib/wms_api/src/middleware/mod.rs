//! Request interceptors, outermost first: CORS, diagnostics, authentication,
//! database.

pub mod auth;
pub mod cors;
pub mod database;
pub mod diagnostics;
