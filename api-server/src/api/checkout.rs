// api-server/src/api/checkout.rs
use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;

use common::models::order::CheckoutInfo;
use common::Config;

use crate::checkout::CheckoutService;
use crate::error::ApiError;
use crate::middleware::auth::SessionContext;
use crate::payment::{verify_webhook_signature, PaymentEvent};

#[post("/checkout")]
pub async fn checkout(
    ctx: SessionContext,
    body: web::Json<CheckoutInfo>,
    service: web::Data<CheckoutService>,
) -> Result<HttpResponse, ApiError> {
    let redirect = service.begin_checkout(&ctx.0, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "checkoutId": redirect.id,
        "redirectUrl": redirect.url
    })))
}

// The payment provider posts here without a session cookie, so this route
// lives outside the session gate.
#[post("/checkout_webhook")]
pub async fn checkout_webhook(
    req: HttpRequest,
    body: web::Bytes,
    service: web::Data<CheckoutService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    if !config.payment.webhook_secret.is_empty() {
        let signature = req
            .headers()
            .get("X-Webhook-Signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("missing webhook signature".to_string()))?;
        if !verify_webhook_signature(&config.payment.webhook_secret, signature, &body) {
            return Err(ApiError::BadRequest("invalid webhook signature".to_string()));
        }
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook payload: {}", e)))?;

    match service.complete_payment(event).await? {
        Some(receipt) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "orderId": receipt.order_id
        }))),
        None => Ok(HttpResponse::Ok().json(json!({ "status": "ignored" }))),
    }
}
