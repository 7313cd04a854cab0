// api-server/src/stores/mod.rs
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use common::models::listing::FurnitureListing;
use common::models::order::Receipt;
use common::models::user::{ShippingAddress, User};

pub mod memory;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
    #[error("record not found")]
    NotFound,
}

/// Field changes applied to a stored user; `None` leaves a field untouched.
/// `session_id` is doubly wrapped so the outer `None` means "no change" and
/// `Some(None)` clears the persisted id.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub session_id: Option<Option<String>>,
    pub subscribed: Option<bool>,
}

/// Account records, keyed by unique username, unique email and generated id
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Option<User>;
    async fn find_by_email(&self, email: &str) -> Option<User>;
    async fn find_by_id(&self, user_id: Uuid) -> Option<User>;
    async fn insert(&self, user: User) -> Result<(), StoreError>;
    async fn update_fields(&self, user_id: Uuid, changes: UserChanges) -> Result<(), StoreError>;
    /// Users who opted into new-listing notifications
    async fn subscribers(&self) -> Vec<User>;
}

/// Furniture listings offered for sale
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn find_by_id(&self, listing_id: Uuid) -> Option<FurnitureListing>;
    /// Resolve a batch of ids; missing ids are simply absent from the result
    async fn find_by_ids(&self, ids: &[Uuid]) -> Vec<FurnitureListing>;
    async fn insert(&self, listing: FurnitureListing) -> Result<(), StoreError>;
    async fn find_all(&self) -> Vec<FurnitureListing>;
    /// Flag listings as sold; returns how many records were updated
    async fn mark_sold(&self, ids: &[Uuid]) -> usize;
}

/// Order history, written once per completed payment
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn insert(&self, receipt: Receipt) -> Result<(), StoreError>;
    async fn find_by_user(&self, user_id: Uuid) -> Vec<Receipt>;
}

/// Per-user shipping address book
#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn find_by_id(&self, address_id: Uuid) -> Option<ShippingAddress>;
    async fn find_by_user(&self, user_id: Uuid) -> Vec<ShippingAddress>;
    async fn insert(&self, address: ShippingAddress) -> Result<(), StoreError>;
    async fn update(&self, address: ShippingAddress) -> Result<(), StoreError>;
    async fn delete(&self, address_id: Uuid) -> bool;
}
