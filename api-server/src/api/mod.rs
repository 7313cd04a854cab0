// api-server/src/api/mod.rs
pub mod accounts;
pub mod checkout;
pub mod listings;

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::middleware::auth::RequireSession;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Antique Furniture Marketplace API",
        "version": "0.1.0"
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Open routes first; everything inside the trailing scope requires a
    // live session cookie
    cfg.service(index)
        .service(accounts::signup)
        .service(accounts::login)
        .service(listings::list_listings)
        .service(listings::get_listing)
        .service(checkout::checkout_webhook)
        .service(
            web::scope("")
                .wrap(RequireSession)
                .service(accounts::logout)
                .service(accounts::get_account)
                .service(accounts::edit_account)
                .service(accounts::list_addresses)
                .service(accounts::add_address)
                .service(accounts::update_address)
                .service(accounts::delete_address)
                .service(accounts::purchase_history)
                .service(listings::create_listing)
                .service(checkout::checkout),
        );
}
