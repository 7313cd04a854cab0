// api-server/src/api/listings.rs
use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use common::models::listing::ListingDraft;

use crate::error::ApiError;
use crate::middleware::auth::SessionContext;
use crate::notifier::ListingNotifier;
use crate::stores::{ListingStore, UserStore};

#[post("/listings")]
pub async fn create_listing(
    ctx: SessionContext,
    body: web::Json<ListingDraft>,
    listings: web::Data<dyn ListingStore>,
    users: web::Data<dyn UserStore>,
    notifier: web::Data<dyn ListingNotifier>,
) -> Result<HttpResponse, ApiError> {
    let seller_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;

    let listing = body
        .into_inner()
        .into_listing(seller_id)
        .map_err(ApiError::InvalidListing)?;
    let listing_id = listing.listing_id;

    listings.insert(listing.clone()).await?;
    tracing::info!("New listing {} posted by {}", listing_id, seller_id);

    // Subscribers hear about the listing off the request path
    let users = users.clone();
    let notifier = notifier.clone();
    tokio::spawn(async move {
        let subscribers: Vec<_> = users
            .subscribers()
            .await
            .into_iter()
            .filter(|u| u.user_id != seller_id)
            .collect();
        notifier.listing_posted(&listing, &subscribers).await;
    });

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "listingId": listing_id
    })))
}

#[get("/listings")]
pub async fn list_listings(
    listings: web::Data<dyn ListingStore>,
) -> Result<HttpResponse, ApiError> {
    let available: Vec<_> = listings
        .find_all()
        .await
        .into_iter()
        .filter(|l| !l.sold)
        .collect();
    Ok(HttpResponse::Ok().json(available))
}

#[get("/listings/{listing_id}")]
pub async fn get_listing(
    path: web::Path<Uuid>,
    listings: web::Data<dyn ListingStore>,
) -> Result<HttpResponse, ApiError> {
    let listing = listings
        .find_by_id(path.into_inner())
        .await
        .ok_or(ApiError::NotFound("listing"))?;
    Ok(HttpResponse::Ok().json(listing))
}
