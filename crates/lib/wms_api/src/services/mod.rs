//! Request-independent flows called by handlers.

pub mod auth;
