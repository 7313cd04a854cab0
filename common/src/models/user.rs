// common/src/models/user.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Stored account record. The password is kept only as an argon2 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    /// Session identifier persisted across logins so a returning client can
    /// be handed the same token it held before
    pub session_id: Option<String>,
    /// Whether the user receives new-listing notifications
    pub subscribed: bool,
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, phone: Option<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            phone,
            session_id: None,
            subscribed: false,
            balance_cents: 0,
            created_at: Utc::now(),
        }
    }
}

/// Signup form payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login form payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account view returned to the client
// Omits the password hash and the persisted session id
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub subscribed: bool,
    pub balance_cents: i64,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            subscribed: user.subscribed,
            balance_cents: user.balance_cents,
        }
    }
}

/// Partial account update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEdit {
    pub new_email: Option<String>,
    pub new_phone: Option<String>,
    pub new_password: Option<String>,
    pub subscribed: Option<bool>,
}

/// Stored shipping address, one user may keep several
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address_id: Uuid,
    pub user_id: Uuid,
    pub state: String,
    pub city: String,
    pub street: String,
    pub zip_code: String,
    #[serde(rename = "default")]
    pub is_default: bool,
}

/// Address create/update payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDraft {
    pub state: String,
    pub city: String,
    pub street: String,
    pub zip_code: String,
    #[serde(rename = "default", default)]
    pub is_default: bool,
}

impl AddressDraft {
    pub fn is_blank(&self) -> bool {
        self.state.trim().is_empty()
            || self.city.trim().is_empty()
            || self.street.trim().is_empty()
            || self.zip_code.trim().is_empty()
    }
}
