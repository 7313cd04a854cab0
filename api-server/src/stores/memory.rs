// api-server/src/stores/memory.rs
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use common::models::listing::FurnitureListing;
use common::models::order::Receipt;
use common::models::user::{ShippingAddress, User};

use super::{AddressStore, ListingStore, ReceiptStore, StoreError, UserChanges, UserStore};

/// In-process user table with secondary indexes for the unique keys
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    username_index: DashMap<String, Uuid>,
    email_index: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Option<User> {
        let user_id = *self.username_index.get(username)?;
        self.users.get(&user_id).map(|entry| entry.clone())
    }

    async fn find_by_email(&self, email: &str) -> Option<User> {
        let user_id = *self.email_index.get(email)?;
        self.users.get(&user_id).map(|entry| entry.clone())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Option<User> {
        self.users.get(&user_id).map(|entry| entry.clone())
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        // Claim the unique keys one at a time, releasing the first claim if
        // the second one loses
        match self.username_index.entry(user.username.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate("username")),
            Entry::Vacant(slot) => {
                slot.insert(user.user_id);
            }
        }
        match self.email_index.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                self.username_index.remove(&user.username);
                return Err(StoreError::Duplicate("email"));
            }
            Entry::Vacant(slot) => {
                slot.insert(user.user_id);
            }
        }

        self.users.insert(user.user_id, user);
        Ok(())
    }

    async fn update_fields(&self, user_id: Uuid, changes: UserChanges) -> Result<(), StoreError> {
        let mut entry = self.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        let user = entry.value_mut();

        if let Some(new_email) = changes.email {
            if new_email != user.email {
                match self.email_index.entry(new_email.clone()) {
                    Entry::Occupied(_) => return Err(StoreError::Duplicate("email")),
                    Entry::Vacant(slot) => {
                        slot.insert(user_id);
                    }
                }
                self.email_index.remove(&user.email);
                user.email = new_email;
            }
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(session_id) = changes.session_id {
            user.session_id = session_id;
        }
        if let Some(subscribed) = changes.subscribed {
            user.subscribed = subscribed;
        }
        Ok(())
    }

    async fn subscribers(&self) -> Vec<User> {
        self.users
            .iter()
            .filter(|entry| entry.value().subscribed)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

/// In-process listing table
#[derive(Default)]
pub struct MemoryListingStore {
    listings: DashMap<Uuid, FurnitureListing>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn find_by_id(&self, listing_id: Uuid) -> Option<FurnitureListing> {
        self.listings.get(&listing_id).map(|entry| entry.clone())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Vec<FurnitureListing> {
        ids.iter()
            .filter_map(|id| self.listings.get(id).map(|entry| entry.clone()))
            .collect()
    }

    async fn insert(&self, listing: FurnitureListing) -> Result<(), StoreError> {
        match self.listings.entry(listing.listing_id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("listingId")),
            Entry::Vacant(slot) => {
                slot.insert(listing);
                Ok(())
            }
        }
    }

    async fn find_all(&self) -> Vec<FurnitureListing> {
        let mut listings: Vec<FurnitureListing> = self
            .listings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    async fn mark_sold(&self, ids: &[Uuid]) -> usize {
        let mut updated = 0;
        for id in ids {
            if let Some(mut entry) = self.listings.get_mut(id) {
                entry.value_mut().sold = true;
                updated += 1;
            }
        }
        updated
    }
}

/// In-process order history
#[derive(Default)]
pub struct MemoryReceiptStore {
    receipts: DashMap<Uuid, Receipt>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptStore for MemoryReceiptStore {
    async fn insert(&self, receipt: Receipt) -> Result<(), StoreError> {
        match self.receipts.entry(receipt.order_id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("orderId")),
            Entry::Vacant(slot) => {
                slot.insert(receipt);
                Ok(())
            }
        }
    }

    async fn find_by_user(&self, user_id: Uuid) -> Vec<Receipt> {
        let mut receipts: Vec<Receipt> = self
            .receipts
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        receipts.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        receipts
    }
}

/// In-process address book
#[derive(Default)]
pub struct MemoryAddressStore {
    addresses: DashMap<Uuid, ShippingAddress>,
}

impl MemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A user keeps at most one default address
    fn clear_default(&self, user_id: Uuid, keep: Uuid) {
        for mut entry in self.addresses.iter_mut() {
            let address = entry.value_mut();
            if address.user_id == user_id && address.address_id != keep {
                address.is_default = false;
            }
        }
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn find_by_id(&self, address_id: Uuid) -> Option<ShippingAddress> {
        self.addresses.get(&address_id).map(|entry| entry.clone())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Vec<ShippingAddress> {
        self.addresses
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn insert(&self, address: ShippingAddress) -> Result<(), StoreError> {
        if address.is_default {
            self.clear_default(address.user_id, address.address_id);
        }
        match self.addresses.entry(address.address_id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate("addressId")),
            Entry::Vacant(slot) => {
                slot.insert(address);
                Ok(())
            }
        }
    }

    async fn update(&self, address: ShippingAddress) -> Result<(), StoreError> {
        if !self.addresses.contains_key(&address.address_id) {
            return Err(StoreError::NotFound);
        }
        if address.is_default {
            self.clear_default(address.user_id, address.address_id);
        }
        self.addresses.insert(address.address_id, address);
        Ok(())
    }

    async fn delete(&self, address_id: Uuid) -> bool {
        self.addresses.remove(&address_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::models::listing::{
        FurnitureCondition, FurnitureKind, FurnitureMaterial, FurnitureStyle, ListingDraft,
    };
    use common::models::order::{Address, ReceiptItem};

    fn user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            email.to_string(),
            "$argon2id$fake".to_string(),
            None,
        )
    }

    fn listing(seller_id: Uuid, price_cents: i64) -> FurnitureListing {
        ListingDraft {
            title: Some("Walnut chest".to_string()),
            description: Some("Queen Anne, original brasses".to_string()),
            price_cents: Some(price_cents),
            kind: Some(FurnitureKind::Chest),
            style: Some(FurnitureStyle::English),
            condition: Some(FurnitureCondition::Good),
            material: Some(FurnitureMaterial::Walnut),
            images: Some(vec![base64::encode(b"img")]),
        }
        .into_listing(seller_id)
        .unwrap()
    }

    #[tokio::test]
    async fn test_username_and_email_must_be_unique() {
        let store = MemoryUserStore::new();
        store.insert(user("edith", "edith@example.com")).await.unwrap();

        let err = store
            .insert(user("edith", "other@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("username"));

        let err = store
            .insert(user("mabel", "edith@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("email"));

        // The username claimed by the failed insert is free again
        store
            .insert(user("mabel", "mabel@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_fields_reindexes_email() {
        let store = MemoryUserStore::new();
        let record = user("edith", "edith@example.com");
        let user_id = record.user_id;
        store.insert(record).await.unwrap();

        store
            .update_fields(
                user_id,
                UserChanges {
                    email: Some("new@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.find_by_email("edith@example.com").await.is_none());
        let found = store.find_by_email("new@example.com").await.unwrap();
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    async fn test_update_fields_can_clear_session_id() {
        let store = MemoryUserStore::new();
        let mut record = user("edith", "edith@example.com");
        record.session_id = Some("tok".to_string());
        let user_id = record.user_id;
        store.insert(record).await.unwrap();

        store
            .update_fields(
                user_id,
                UserChanges {
                    session_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(store.find_by_id(user_id).await.unwrap().session_id.is_none());
    }

    #[tokio::test]
    async fn test_subscribers_only() {
        let store = MemoryUserStore::new();
        let mut subscribed = user("edith", "edith@example.com");
        subscribed.subscribed = true;
        store.insert(subscribed).await.unwrap();
        store.insert(user("mabel", "mabel@example.com")).await.unwrap();

        let subs = store.subscribers().await;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].username, "edith");
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_missing() {
        let store = MemoryListingStore::new();
        let seller = Uuid::new_v4();
        let kept = listing(seller, 50_000);
        store.insert(kept.clone()).await.unwrap();

        let found = store.find_by_ids(&[kept.listing_id, Uuid::new_v4()]).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].listing_id, kept.listing_id);
    }

    #[tokio::test]
    async fn test_mark_sold() {
        let store = MemoryListingStore::new();
        let seller = Uuid::new_v4();
        let first = listing(seller, 10_000);
        let second = listing(seller, 20_000);
        store.insert(first.clone()).await.unwrap();
        store.insert(second.clone()).await.unwrap();

        let updated = store
            .mark_sold(&[first.listing_id, Uuid::new_v4()])
            .await;
        assert_eq!(updated, 1);
        assert!(store.find_by_id(first.listing_id).await.unwrap().sold);
        assert!(!store.find_by_id(second.listing_id).await.unwrap().sold);
    }

    #[tokio::test]
    async fn test_receipts_sorted_newest_first() {
        let store = MemoryReceiptStore::new();
        let user_id = Uuid::new_v4();
        let address = Address {
            state: "VT".to_string(),
            city: "Barre".to_string(),
            street: "12 Granite St".to_string(),
            zip_code: "05641".to_string(),
        };

        for (age_days, total) in [(2, 100), (1, 200)] {
            let purchased_at = Utc::now() - Duration::days(age_days);
            store
                .insert(Receipt {
                    order_id: Uuid::new_v4(),
                    user_id,
                    shipping_address: address.clone(),
                    payment_method: "card".to_string(),
                    subtotal_cents: total,
                    tax_cents: 0,
                    total_cents: total,
                    items: vec![ReceiptItem {
                        listing_id: Uuid::new_v4(),
                        seller_id: Uuid::new_v4(),
                        title: "Chair".to_string(),
                        price_cents: total,
                    }],
                    purchased_at,
                    estimated_delivery: purchased_at + Duration::days(14),
                })
                .await
                .unwrap();
        }

        let receipts = store.find_by_user(user_id).await;
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].total_cents, 200);
        assert!(store.find_by_user(Uuid::new_v4()).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_default_address_per_user() {
        let store = MemoryAddressStore::new();
        let user_id = Uuid::new_v4();

        let mut first = ShippingAddress {
            address_id: Uuid::new_v4(),
            user_id,
            state: "VT".to_string(),
            city: "Barre".to_string(),
            street: "12 Granite St".to_string(),
            zip_code: "05641".to_string(),
            is_default: true,
        };
        store.insert(first.clone()).await.unwrap();

        let second = ShippingAddress {
            address_id: Uuid::new_v4(),
            user_id,
            state: "VT".to_string(),
            city: "Montpelier".to_string(),
            street: "4 State St".to_string(),
            zip_code: "05602".to_string(),
            is_default: true,
        };
        store.insert(second.clone()).await.unwrap();

        first = store.find_by_id(first.address_id).await.unwrap();
        assert!(!first.is_default);
        assert!(store.find_by_id(second.address_id).await.unwrap().is_default);

        assert!(store.delete(second.address_id).await);
        assert!(!store.delete(second.address_id).await);
        assert_eq!(store.find_by_user(user_id).await.len(), 1);
    }
}
