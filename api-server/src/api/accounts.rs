// api-server/src/api/accounts.rs
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use common::models::session::SessionTemplate;
use common::models::user::{
    AccountEdit, AddressDraft, LoginRequest, ShippingAddress, SignupRequest, User, UserProfile,
};
use common::Config;

use crate::error::ApiError;
use crate::middleware::auth::SessionContext;
use crate::session::{clear_session_cookie, session_cookie, SessionError, SessionManager};
use crate::stores::{AddressStore, ReceiptStore, UserChanges, UserStore};
use crate::utils::password::{hash_password, verify_password};

#[post("/signup")]
pub async fn signup(
    body: web::Json<SignupRequest>,
    sessions: web::Data<SessionManager>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    if body.username.trim().is_empty()
        || body.email.trim().is_empty()
        || body.password.is_empty()
        || body.confirm_password.is_empty()
    {
        return Err(ApiError::BlankFields);
    }
    if body.password != body.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    if users.find_by_username(&body.username).await.is_some() {
        return Err(ApiError::UsernameTaken);
    }
    if users.find_by_email(&body.email).await.is_some() {
        return Err(ApiError::EmailTaken);
    }

    let password_hash = hash_password(&body.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    // Mint a session id for the account up front; login replays it so the
    // cookie value stays stable across logins
    let presession = sessions.create_session(SessionTemplate::Generated)?;
    sessions.delete_session(&presession.id);

    // Accounts start unsubscribed; opting in happens through account edit
    let mut user = User::new(body.username, body.email, password_hash, body.phone);
    user.session_id = Some(presession.id);
    let user_id = user.user_id;

    users.insert(user).await?;

    tracing::info!("New account created: {}", user_id);
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "userId": user_id
    })))
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    users: web::Data<dyn UserStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BlankFields);
    }

    let user = users
        .find_by_username(&body.username)
        .await
        .ok_or(ApiError::InvalidLogin)?;
    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::InvalidLogin);
    }

    // Reuse the account's session id when we can: a live session is picked
    // up as-is, a dead one is re-created under the same id
    let session = match user.session_id.as_deref() {
        Some(id) => match sessions.get_session(id) {
            Some(live) => live,
            None => match sessions.create_session(SessionTemplate::Explicit(id.to_string())) {
                Ok(session) => session,
                Err(SessionError::AlreadyExists(_)) => {
                    sessions.get_session(id).ok_or_else(|| {
                        ApiError::Internal("session vanished during login".to_string())
                    })?
                }
            },
        },
        None => sessions.create_session(SessionTemplate::Generated)?,
    };

    let session = sessions
        .attach_identity(&session.id, user.user_id, &user.username)
        .ok_or_else(|| ApiError::Internal("session vanished during login".to_string()))?;

    if user.session_id.as_deref() != Some(session.id.as_str()) {
        users
            .update_fields(
                user.user_id,
                UserChanges {
                    session_id: Some(Some(session.id.clone())),
                    ..Default::default()
                },
            )
            .await?;
    }

    tracing::info!("User {} logged in with session {}", user.username, session.id);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&session.id, &config.session))
        .json(json!({
            "status": "success",
            "userId": user.user_id,
            "username": user.username
        })))
}

#[post("/logout")]
pub async fn logout(
    ctx: SessionContext,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, ApiError> {
    sessions.delete_session(&ctx.0.id);
    tracing::info!("Session {} logged out", ctx.0.id);

    Ok(HttpResponse::Ok()
        .cookie(clear_session_cookie())
        .json(json!({
            "status": "success",
            "message": "Logged out"
        })))
}

#[get("/account")]
pub async fn get_account(
    ctx: SessionContext,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let user = users
        .find_by_id(user_id)
        .await
        .ok_or(ApiError::NotFound("account"))?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

#[put("/account")]
pub async fn edit_account(
    ctx: SessionContext,
    body: web::Json<AccountEdit>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let body = body.into_inner();

    let mut changes = UserChanges::default();
    if let Some(email) = body.new_email {
        if email.trim().is_empty() {
            return Err(ApiError::BlankFields);
        }
        changes.email = Some(email);
    }
    if let Some(phone) = body.new_phone {
        changes.phone = Some(phone);
    }
    if let Some(password) = body.new_password {
        if password.is_empty() {
            return Err(ApiError::BlankFields);
        }
        let hash = hash_password(&password)
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;
        changes.password_hash = Some(hash);
    }
    if let Some(subscribed) = body.subscribed {
        changes.subscribed = Some(subscribed);
    }

    users.update_fields(user_id, changes).await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

#[get("/account/addresses")]
pub async fn list_addresses(
    ctx: SessionContext,
    addresses: web::Data<dyn AddressStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let found = addresses.find_by_user(user_id).await;
    Ok(HttpResponse::Ok().json(found))
}

#[post("/account/addresses")]
pub async fn add_address(
    ctx: SessionContext,
    body: web::Json<AddressDraft>,
    addresses: web::Data<dyn AddressStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let draft = body.into_inner();
    if draft.is_blank() {
        return Err(ApiError::BlankFields);
    }

    let address = ShippingAddress {
        address_id: Uuid::new_v4(),
        user_id,
        state: draft.state,
        city: draft.city,
        street: draft.street,
        zip_code: draft.zip_code,
        is_default: draft.is_default,
    };
    let address_id = address.address_id;
    addresses.insert(address).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "addressId": address_id
    })))
}

#[put("/account/addresses/{address_id}")]
pub async fn update_address(
    ctx: SessionContext,
    path: web::Path<Uuid>,
    body: web::Json<AddressDraft>,
    addresses: web::Data<dyn AddressStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let address_id = path.into_inner();

    // Another user's address is indistinguishable from a missing one
    let existing = addresses
        .find_by_id(address_id)
        .await
        .filter(|a| a.user_id == user_id)
        .ok_or(ApiError::NotFound("address"))?;

    let draft = body.into_inner();
    if draft.is_blank() {
        return Err(ApiError::BlankFields);
    }

    addresses
        .update(ShippingAddress {
            address_id: existing.address_id,
            user_id,
            state: draft.state,
            city: draft.city,
            street: draft.street,
            zip_code: draft.zip_code,
            is_default: draft.is_default,
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

#[delete("/account/addresses/{address_id}")]
pub async fn delete_address(
    ctx: SessionContext,
    path: web::Path<Uuid>,
    addresses: web::Data<dyn AddressStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let address_id = path.into_inner();

    addresses
        .find_by_id(address_id)
        .await
        .filter(|a| a.user_id == user_id)
        .ok_or(ApiError::NotFound("address"))?;
    addresses.delete(address_id).await;

    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

#[get("/account/orders")]
pub async fn purchase_history(
    ctx: SessionContext,
    receipts: web::Data<dyn ReceiptStore>,
) -> Result<HttpResponse, ApiError> {
    let user_id = ctx.0.user_id().ok_or(ApiError::Unauthorized)?;
    let orders = receipts.find_by_user(user_id).await;
    Ok(HttpResponse::Ok().json(orders))
}
