// api-server/src/checkout.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use common::config::CheckoutConfig;
use common::models::order::{Address, CheckoutInfo, Receipt, ReceiptItem};
use common::models::session::Session;

use crate::error::ApiError;
use crate::payment::{
    CheckoutRedirect, PaymentEvent, PaymentEventType, PaymentGateway, PaymentLineItem,
    PaymentOrder,
};
use crate::session::SessionManager;
use crate::stores::{ListingStore, ReceiptStore};

// Processed event ids are kept long enough to absorb gateway retries.
const EVENT_RETENTION_HOURS: i64 = 24;

const DELIVERY_ESTIMATE_DAYS: i64 = 14;

/// Order captured at checkout time, parked until the gateway calls back.
pub struct PendingOrder {
    pub user_id: Uuid,
    pub items: Vec<ReceiptItem>,
    pub shipping_address: Address,
    pub payment_method: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Orchestrates the two halves of a purchase: pricing the cart and sending
/// the buyer to the hosted payment page, then turning the gateway callback
/// into a receipt. Pending orders are keyed by the buyer's session id, which
/// doubles as the correlation token on the wire.
pub struct CheckoutService {
    sessions: Arc<SessionManager>,
    listings: Arc<dyn ListingStore>,
    receipts: Arc<dyn ReceiptStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
    /// Correlation table, process-local. Checkouts initiated here can only be
    /// completed by a webhook landing on the same instance; running more than
    /// one instance needs an external keyed store for sessions and pending
    /// orders.
    pending: DashMap<String, PendingOrder>,
    seen_events: DashMap<String, DateTime<Utc>>,
}

impl CheckoutService {
    pub fn new(
        sessions: Arc<SessionManager>,
        listings: Arc<dyn ListingStore>,
        receipts: Arc<dyn ReceiptStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            sessions,
            listings,
            receipts,
            gateway,
            config,
            pending: DashMap::new(),
            seen_events: DashMap::new(),
        }
    }

    /// Price the cart server-side, park a pending order under the session id
    /// and ask the gateway for a hosted payment page.
    pub async fn begin_checkout(
        &self,
        session: &Session,
        info: CheckoutInfo,
    ) -> Result<CheckoutRedirect, ApiError> {
        let user_id = session.user_id().ok_or(ApiError::Unauthorized)?;

        if info.shopping_cart.is_empty() {
            return Err(ApiError::EmptyCart);
        }

        // One-of-a-kind pieces: the same id listed twice is one purchase
        let mut seen = HashSet::with_capacity(info.shopping_cart.len());
        let mut cart = Vec::with_capacity(info.shopping_cart.len());
        for raw in &info.shopping_cart {
            let id = Uuid::parse_str(raw).map_err(|_| ApiError::UnknownListing(raw.clone()))?;
            if seen.insert(id) {
                cart.push((raw, id));
            }
        }
        let ids: Vec<Uuid> = cart.iter().map(|(_, id)| *id).collect();

        let listings = self.listings.find_by_ids(&ids).await;
        if listings.len() != ids.len() {
            for (raw, id) in &cart {
                if !listings.iter().any(|l| l.listing_id == *id) {
                    return Err(ApiError::UnknownListing((*raw).clone()));
                }
            }
        }
        for listing in &listings {
            if listing.sold {
                return Err(ApiError::ListingUnavailable(listing.listing_id.to_string()));
            }
        }

        // Cart prices come from the listings, never from the request body
        let subtotal_cents: i64 = listings.iter().map(|l| l.price_cents).sum();
        let tax_cents = (subtotal_cents as f64 * self.config.tax_rate).round() as i64;
        let total_cents = subtotal_cents + tax_cents;
        let currency = info
            .payment
            .currency
            .clone()
            .unwrap_or_else(|| self.config.currency.clone());

        let items: Vec<ReceiptItem> = listings
            .iter()
            .map(|l| ReceiptItem {
                listing_id: l.listing_id,
                seller_id: l.seller_id,
                title: l.title.clone(),
                price_cents: l.price_cents,
            })
            .collect();
        let line_items: Vec<PaymentLineItem> = listings
            .iter()
            .map(|l| PaymentLineItem {
                listing_id: l.listing_id.to_string(),
                title: l.title.clone(),
                unit_amount_cents: l.price_cents,
                quantity: 1,
            })
            .collect();

        let order = PaymentOrder {
            correlation_token: session.id.clone(),
            line_items,
            total_cents,
            currency,
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
        };

        // Park the order before any gateway I/O so the callback can never
        // arrive ahead of it
        self.pending.insert(
            session.id.clone(),
            PendingOrder {
                user_id,
                items,
                shipping_address: info.shipping_address,
                payment_method: info.payment.payment_method,
                subtotal_cents,
                tax_cents,
                total_cents,
                created_at: Utc::now(),
            },
        );

        match self.gateway.initiate_checkout(order).await {
            Ok(redirect) => {
                tracing::info!(
                    "Checkout started for session {}: {} item(s), {} cents total",
                    session.id,
                    ids.len(),
                    total_cents
                );
                Ok(redirect)
            }
            Err(e) => {
                self.pending.remove(&session.id);
                tracing::error!("Payment initiation failed for session {}: {}", session.id, e);
                Err(ApiError::PaymentInitiation(e.to_string()))
            }
        }
    }

    /// Apply a gateway callback event. `Ok(Some(receipt))` means an order was
    /// finalized; `Ok(None)` means the event was absorbed without one.
    pub async fn complete_payment(
        &self,
        event: PaymentEvent,
    ) -> Result<Option<Receipt>, ApiError> {
        match event.kind() {
            PaymentEventType::Unknown(kind) => {
                tracing::info!("Ignoring unhandled payment event {} ({})", event.id, kind);
                Ok(None)
            }
            PaymentEventType::CheckoutExpired => {
                if let Some(token) = event.metadata.correlation_token.as_deref() {
                    if self.pending.remove(token).is_some() {
                        tracing::info!("Checkout expired for session {}", token);
                    }
                }
                Ok(None)
            }
            PaymentEventType::CheckoutCompleted => {
                let token = event
                    .metadata
                    .correlation_token
                    .clone()
                    .ok_or_else(|| {
                        ApiError::BadRequest("missing correlation token".to_string())
                    })?;

                // Claim the event id before touching any state so a gateway
                // retry racing this delivery is absorbed
                if self.seen_events.insert(event.id.clone(), Utc::now()).is_some() {
                    tracing::info!("Duplicate payment event {} absorbed", event.id);
                    return Ok(None);
                }

                match self.finalize_order(&token).await {
                    Ok(receipt) => Ok(Some(receipt)),
                    Err(e) => {
                        // Nothing was committed, so let a later retry land
                        self.seen_events.remove(&event.id);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn finalize_order(&self, token: &str) -> Result<Receipt, ApiError> {
        if self.sessions.get_session(token).is_none() {
            tracing::warn!("Payment completed for a session that is gone: {}", token);
            return Err(ApiError::UnknownCorrelation(token.to_string()));
        }

        // Removing the pending entry is the commit point: two callbacks for
        // the same order cannot both get past it
        let (_, order) = self.pending.remove(token).ok_or_else(|| {
            ApiError::BadRequest("no pending order for this checkout".to_string())
        })?;

        let receipt = Receipt {
            order_id: Uuid::new_v4(),
            user_id: order.user_id,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            subtotal_cents: order.subtotal_cents,
            tax_cents: order.tax_cents,
            total_cents: order.total_cents,
            items: order.items,
            purchased_at: Utc::now(),
            estimated_delivery: Utc::now() + Duration::days(DELIVERY_ESTIMATE_DAYS),
        };

        self.receipts.insert(receipt.clone()).await?;

        let sold: Vec<Uuid> = receipt.items.iter().map(|item| item.listing_id).collect();
        self.listings.mark_sold(&sold).await;

        tracing::info!(
            "Order {} finalized for user {}: {} item(s), {} cents total",
            receipt.order_id,
            receipt.user_id,
            receipt.items.len(),
            receipt.total_cents
        );
        Ok(receipt)
    }

    /// Drop pending orders past the configured TTL and forget old event ids.
    pub fn remove_stale(&self) -> usize {
        let now = Utc::now();

        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| {
                (now - entry.value().created_at).num_seconds() > self.config.pending_ttl_secs
            })
            .map(|entry| entry.key().clone())
            .collect();
        for token in &stale {
            self.pending.remove(token);
            tracing::info!("Dropped stale pending order for session {}", token);
        }

        self.seen_events
            .retain(|_, seen_at| (now - *seen_at).num_hours() < EVENT_RETENTION_HOURS);

        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use common::config::Config;
    use common::models::listing::{
        FurnitureCondition, FurnitureKind, FurnitureMaterial, FurnitureStyle, ListingDraft,
    };
    use common::models::order::PaymentInfo;
    use common::models::session::SessionTemplate;

    use crate::payment::{EventMetadata, PaymentError};
    use crate::stores::memory::{MemoryListingStore, MemoryReceiptStore};

    struct StubGateway {
        orders: Mutex<Vec<PaymentOrder>>,
        fail: bool,
    }

    impl StubGateway {
        fn new(fail: bool) -> Self {
            Self {
                orders: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentGateway for StubGateway {
        async fn initiate_checkout(
            &self,
            order: PaymentOrder,
        ) -> Result<CheckoutRedirect, PaymentError> {
            self.orders.lock().unwrap().push(order);
            if self.fail {
                return Err(PaymentError::Rejected {
                    status: 503,
                    body: "provider down".to_string(),
                });
            }
            Ok(CheckoutRedirect {
                id: "cs_test".to_string(),
                url: "https://payments.example.com/pay/cs_test".to_string(),
            })
        }
    }

    struct Fixture {
        service: CheckoutService,
        sessions: Arc<SessionManager>,
        listings: Arc<MemoryListingStore>,
        receipts: Arc<MemoryReceiptStore>,
        gateway: Arc<StubGateway>,
    }

    fn fixture(tax_rate: f64, fail_gateway: bool) -> Fixture {
        let defaults = Config::default();
        let sessions = Arc::new(SessionManager::new(&defaults.session));
        let listings = Arc::new(MemoryListingStore::new());
        let receipts = Arc::new(MemoryReceiptStore::new());
        let gateway = Arc::new(StubGateway::new(fail_gateway));

        let mut config = defaults.checkout;
        config.tax_rate = tax_rate;

        let service = CheckoutService::new(
            sessions.clone(),
            listings.clone(),
            receipts.clone(),
            gateway.clone(),
            config,
        );
        Fixture {
            service,
            sessions,
            listings,
            receipts,
            gateway,
        }
    }

    fn buyer_session(sessions: &SessionManager) -> Session {
        let session = sessions.create_session(SessionTemplate::Generated).unwrap();
        sessions
            .attach_identity(&session.id, Uuid::new_v4(), "edith")
            .unwrap()
    }

    async fn seed_listing(listings: &MemoryListingStore, price_cents: i64) -> Uuid {
        let listing = ListingDraft {
            title: Some("Mahogany secretary desk".to_string()),
            description: Some("Federal period, fitted interior".to_string()),
            price_cents: Some(price_cents),
            kind: Some(FurnitureKind::Desk),
            style: Some(FurnitureStyle::Federal),
            condition: Some(FurnitureCondition::Excellent),
            material: Some(FurnitureMaterial::Mahogany),
            images: Some(vec![base64::encode(b"img")]),
        }
        .into_listing(Uuid::new_v4())
        .unwrap();
        let id = listing.listing_id;
        listings.insert(listing).await.unwrap();
        id
    }

    fn cart(ids: &[Uuid]) -> CheckoutInfo {
        CheckoutInfo {
            shopping_cart: ids.iter().map(|id| id.to_string()).collect(),
            payment: PaymentInfo {
                payment_method: "card".to_string(),
                currency: None,
            },
            shipping_address: Address {
                state: "VT".to_string(),
                city: "Barre".to_string(),
                street: "12 Granite St".to_string(),
                zip_code: "05641".to_string(),
            },
        }
    }

    fn completed_event(id: &str, token: &str) -> PaymentEvent {
        PaymentEvent {
            id: id.to_string(),
            event_type: "checkout.completed".to_string(),
            metadata: EventMetadata {
                correlation_token: Some(token.to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_checkout_prices_cart_with_tax() {
        let fx = fixture(0.0825, false);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 185_000).await;

        let redirect = fx
            .service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap();
        assert_eq!(redirect.id, "cs_test");

        let orders = fx.gateway.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].correlation_token, session.id);
        assert_eq!(orders[0].total_cents, 185_000 + 15_263);
        assert_eq!(orders[0].currency, "usd");

        let parked = fx.service.pending.get(&session.id).unwrap();
        assert_eq!(parked.tax_cents, 15_263);
        assert_eq!(parked.items.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_cart_ids_price_once() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 185_000).await;

        fx.service
            .begin_checkout(&session, cart(&[listing_id, listing_id]))
            .await
            .unwrap();

        {
            let orders = fx.gateway.orders.lock().unwrap();
            assert_eq!(orders[0].total_cents, 185_000);
            assert_eq!(orders[0].line_items.len(), 1);
        }

        let parked = fx.service.pending.get(&session.id).unwrap();
        assert_eq!(parked.subtotal_cents, 185_000);
        assert_eq!(parked.items.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_cart() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);

        let err = fx
            .service
            .begin_checkout(&session, cart(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::EmptyCart));
        assert!(fx.gateway.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rejects_unknown_listing_before_gateway() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let missing = Uuid::new_v4();

        let err = fx
            .service
            .begin_checkout(&session, cart(&[missing]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownListing(ref id) if *id == missing.to_string()));
        assert!(fx.gateway.orders.lock().unwrap().is_empty());
        assert!(fx.service.pending.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rejects_sold_listing() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 50_000).await;
        fx.listings.mark_sold(&[listing_id]).await;

        let err = fx
            .service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ListingUnavailable(_)));
        assert!(fx.gateway.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_drops_pending_order() {
        let fx = fixture(0.0, true);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 50_000).await;

        let err = fx
            .service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PaymentInitiation(_)));
        assert!(fx.service.pending.is_empty());
    }

    #[tokio::test]
    async fn test_completed_event_finalizes_exactly_once() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let user_id = session.user_id().unwrap();
        let listing_id = seed_listing(&fx.listings, 50_000).await;

        fx.service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap();

        let receipt = fx
            .service
            .complete_payment(completed_event("evt_1", &session.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.user_id, user_id);
        assert_eq!(receipt.total_cents, 50_000);
        assert!(fx.listings.find_by_id(listing_id).await.unwrap().sold);
        assert_eq!(fx.receipts.find_by_user(user_id).await.len(), 1);

        // Gateway retry of the same event is absorbed
        let second = fx
            .service
            .complete_payment(completed_event("evt_1", &session.id))
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(fx.receipts.find_by_user(user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_event_after_logout_is_gone() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let user_id = session.user_id().unwrap();
        let listing_id = seed_listing(&fx.listings, 50_000).await;

        fx.service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap();
        fx.sessions.delete_session(&session.id);

        let err = fx
            .service
            .complete_payment(completed_event("evt_2", &session.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownCorrelation(_)));

        // Nothing was committed and a retry sees the same answer
        assert!(fx.receipts.find_by_user(user_id).await.is_empty());
        assert!(!fx.listings.find_by_id(listing_id).await.unwrap().sold);
        let retry = fx
            .service
            .complete_payment(completed_event("evt_2", &session.id))
            .await
            .unwrap_err();
        assert!(matches!(retry, ApiError::UnknownCorrelation(_)));
    }

    #[tokio::test]
    async fn test_expired_event_drops_pending_order() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 50_000).await;

        fx.service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap();
        assert!(fx.service.pending.contains_key(&session.id));

        let outcome = fx
            .service
            .complete_payment(PaymentEvent {
                id: "evt_3".to_string(),
                event_type: "checkout.expired".to_string(),
                metadata: EventMetadata {
                    correlation_token: Some(session.id.clone()),
                },
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(fx.service.pending.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let fx = fixture(0.0, false);

        let outcome = fx
            .service
            .complete_payment(PaymentEvent {
                id: "evt_4".to_string(),
                event_type: "refund.created".to_string(),
                metadata: EventMetadata::default(),
            })
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_remove_stale_prunes_old_orders_and_events() {
        let fx = fixture(0.0, false);
        let session = buyer_session(&fx.sessions);
        let listing_id = seed_listing(&fx.listings, 50_000).await;

        fx.service
            .begin_checkout(&session, cart(&[listing_id]))
            .await
            .unwrap();
        fx.service
            .pending
            .get_mut(&session.id)
            .unwrap()
            .created_at = Utc::now() - Duration::seconds(3601);
        fx.service
            .seen_events
            .insert("evt_old".to_string(), Utc::now() - Duration::hours(25));
        fx.service.seen_events.insert("evt_new".to_string(), Utc::now());

        assert_eq!(fx.service.remove_stale(), 1);
        assert!(fx.service.pending.is_empty());
        assert!(!fx.service.seen_events.contains_key("evt_old"));
        assert!(fx.service.seen_events.contains_key("evt_new"));
    }
}
