// api-server/src/middleware/mod.rs
pub mod auth;
