// api-server/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;
use crate::stores::StoreError;

/// Client- and server-facing error taxonomy for the HTTP surface.
/// Every handler returns `Result<HttpResponse, ApiError>` and lets the
/// `ResponseError` impl render the status and JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found; you must be logged in")]
    Unauthorized,
    #[error("Invalid login")]
    InvalidLogin,
    #[error("Username is taken")]
    UsernameTaken,
    #[error("Email is taken")]
    EmailTaken,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("One or more required fields are blank")]
    BlankFields,
    #[error("session {0} already exists")]
    SessionExists(String),
    #[error("{0}")]
    InvalidListing(&'static str),
    #[error("shopping cart is empty")]
    EmptyCart,
    #[error("unknown listing: {0}")]
    UnknownListing(String),
    #[error("listing is no longer available: {0}")]
    ListingUnavailable(String),
    #[error("payment initiation failed: {0}")]
    PaymentInitiation(String),
    #[error("no live session for correlation token {0}")]
    UnknownCorrelation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidLogin => StatusCode::UNAUTHORIZED,
            ApiError::UsernameTaken
            | ApiError::EmailTaken
            | ApiError::SessionExists(_)
            | ApiError::ListingUnavailable(_) => StatusCode::CONFLICT,
            ApiError::PasswordMismatch
            | ApiError::BlankFields
            | ApiError::InvalidListing(_)
            | ApiError::EmptyCart
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownListing(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnknownCorrelation(_) => StatusCode::GONE,
            ApiError::PaymentInitiation(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyExists(id) => ApiError::SessionExists(id),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate("username") => ApiError::UsernameTaken,
            StoreError::Duplicate("email") => ApiError::EmailTaken,
            StoreError::Duplicate(key) => ApiError::Internal(format!("duplicate key: {}", key)),
            StoreError::NotFound => ApiError::NotFound("record"),
        }
    }
}
