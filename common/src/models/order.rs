// common/src/models/order.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Checkout request body: the cart plus payment and shipping metadata.
/// Transient; it lives for one checkout request and the callback window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInfo {
    pub shopping_cart: Vec<String>,
    pub payment: PaymentInfo,
    pub shipping_address: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub payment_method: String,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Bare postal address as carried by checkout requests and receipts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub state: String,
    pub city: String,
    pub street: String,
    pub zip_code: String,
}

/// One purchased piece on a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price_cents: i64,
}

/// Read-only purchase summary, written once when payment completes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub shipping_address: Address,
    pub payment_method: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub items: Vec<ReceiptItem>,
    pub purchased_at: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
}
