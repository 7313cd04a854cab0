// common/src/models/mod.rs
pub mod session;
pub mod user;
pub mod listing;
pub mod order;
