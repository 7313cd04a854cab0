// api-server/src/payment.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::config::PaymentConfig;

/// Order forwarded to the hosted payment page. The correlation token rides
/// along in the gateway metadata and comes back on the callback event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub correlation_token: String,
    pub line_items: Vec<PaymentLineItem>,
    pub total_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLineItem {
    pub listing_id: String,
    pub title: String,
    pub unit_amount_cents: i64,
    pub quantity: u32,
}

/// Gateway response pointing the buyer at the hosted payment page.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRedirect {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment gateway rejected the order: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_checkout(&self, order: PaymentOrder)
        -> Result<CheckoutRedirect, PaymentError>;
}

/// HTTP client for the hosted checkout provider.
pub struct HostedCheckoutClient {
    client: reqwest::Client,
    api_base: String,
}

impl HostedCheckoutClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckoutClient {
    async fn initiate_checkout(
        &self,
        order: PaymentOrder,
    ) -> Result<CheckoutRedirect, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/checkout_sessions", self.api_base))
            .json(&serde_json::json!({
                "lineItems": order.line_items,
                "totalCents": order.total_cents,
                "currency": order.currency,
                "successUrl": order.success_url,
                "cancelUrl": order.cancel_url,
                "metadata": { "correlationToken": order.correlation_token },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status, body });
        }

        Ok(resp.json::<CheckoutRedirect>().await?)
    }
}

/// Gateway callback event types we handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEventType {
    CheckoutCompleted,
    CheckoutExpired,
    Unknown(String),
}

impl From<&str> for PaymentEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.completed" => Self::CheckoutCompleted,
            "checkout.expired" => Self::CheckoutExpired,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Callback payload posted by the gateway once the buyer pays or the
/// hosted page expires.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub metadata: EventMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub correlation_token: Option<String>,
}

impl PaymentEvent {
    pub fn kind(&self) -> PaymentEventType {
        PaymentEventType::from(self.event_type.as_str())
    }
}

/// Verify a gateway callback signature.
///
/// The gateway signs `<timestamp>.<raw body>` with HMAC-SHA256 and sends
/// the digest as `t=<timestamp>,v1=<hex digest>`.
pub fn verify_webhook_signature(webhook_secret: &str, signature: &str, payload: &[u8]) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let parts: std::collections::HashMap<&str, &str> = signature
        .split(',')
        .filter_map(|part| part.split_once('='))
        .collect();

    let timestamp = match parts.get("t") {
        Some(t) => *t,
        None => return false,
    };
    let expected = match parts.get("v1") {
        Some(s) => *s,
        None => return false,
    };

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));

    type HmacSha256 = Hmac<Sha256>;
    let Ok(mut mac) = HmacSha256::new_from_slice(webhook_secret.as_bytes()) else {
        return false;
    };
    mac.update(signed_payload.as_bytes());

    hex::encode(mac.finalize().into_bytes()) == expected
}
