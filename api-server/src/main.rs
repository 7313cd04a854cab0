// api-server/src/main.rs
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};

use common::{setup_tracing, Config};

use api_server::api;
use api_server::checkout::CheckoutService;
use api_server::notifier::{ListingNotifier, LogNotifier};
use api_server::payment::{HostedCheckoutClient, PaymentGateway};
use api_server::session::SessionManager;
use api_server::stores::memory::{
    MemoryAddressStore, MemoryListingStore, MemoryReceiptStore, MemoryUserStore,
};
use api_server::stores::{AddressStore, ListingStore, ReceiptStore, UserStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();
    let server_addr = config.server_addr.clone();

    tracing::info!("Starting Marketplace API Server on {}", server_addr);

    let sessions = Arc::new(SessionManager::new(&config.session));
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let listings: Arc<dyn ListingStore> = Arc::new(MemoryListingStore::new());
    let receipts: Arc<dyn ReceiptStore> = Arc::new(MemoryReceiptStore::new());
    let addresses: Arc<dyn AddressStore> = Arc::new(MemoryAddressStore::new());
    let notifier: Arc<dyn ListingNotifier> = Arc::new(LogNotifier);

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        HostedCheckoutClient::new(&config.payment)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
    );

    let checkout = web::Data::new(CheckoutService::new(
        sessions.clone(),
        listings.clone(),
        receipts.clone(),
        gateway,
        config.checkout.clone(),
    ));

    // Background sweep for idle sessions and stale pending orders
    let sweep_interval = config.session.sweep_interval_secs;
    {
        let sessions = sessions.clone();
        let checkout = checkout.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval));
            loop {
                interval.tick().await;
                let evicted = sessions.remove_expired();
                if evicted > 0 {
                    tracing::info!("Cleaned up {} expired sessions", evicted);
                }
                let dropped = checkout.remove_stale();
                if dropped > 0 {
                    tracing::info!("Cleaned up {} stale pending orders", dropped);
                }
            }
        });
    }

    let session_data = web::Data::from(sessions);
    let user_data = web::Data::from(users);
    let listing_data = web::Data::from(listings);
    let receipt_data = web::Data::from(receipts);
    let address_data = web::Data::from(addresses);
    let notifier_data = web::Data::from(notifier);
    let config_data = web::Data::new(config);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(session_data.clone())
            .app_data(user_data.clone())
            .app_data(listing_data.clone())
            .app_data(receipt_data.clone())
            .app_data(address_data.clone())
            .app_data(notifier_data.clone())
            .app_data(checkout.clone())
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
