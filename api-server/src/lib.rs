// api-server/src/lib.rs
pub mod api;
pub mod checkout;
pub mod error;
pub mod middleware;
pub mod notifier;
pub mod payment;
pub mod session;
pub mod stores;
pub mod utils;
