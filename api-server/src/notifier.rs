// api-server/src/notifier.rs
use async_trait::async_trait;

use common::models::listing::FurnitureListing;
use common::models::user::User;

/// Fan-out hook fired after a new listing is posted.
#[async_trait]
pub trait ListingNotifier: Send + Sync {
    async fn listing_posted(&self, listing: &FurnitureListing, subscribers: &[User]);
}

/// Notifier that records each delivery in the log. A mail or push
/// integration would slot in behind the same trait.
pub struct LogNotifier;

#[async_trait]
impl ListingNotifier for LogNotifier {
    async fn listing_posted(&self, listing: &FurnitureListing, subscribers: &[User]) {
        for user in subscribers {
            tracing::info!(
                "Notifying {} about new listing: {} ({})",
                user.username,
                listing.title,
                listing.listing_id
            );
        }
    }
}
