// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Server-side session record, keyed by an opaque token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique session identifier; also the value carried by the cookie
    pub id: String,
    /// Who this session belongs to, once login has completed
    pub identity: Option<UserIdentity>,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of last activity, drives idle eviction
    pub last_active: DateTime<Utc>,
}

/// Typed identity attached to a session after a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub username: String,
}

impl Session {
    /// Create a fresh session with no identity attached yet
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            identity: None,
            created_at: now,
            last_active: now,
        }
    }

    /// Update session activity timestamp
    pub fn update_activity(&mut self) {
        self.last_active = Utc::now();
    }

    /// Check if the session has sat idle past its TTL
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let now = Utc::now();
        let age = now.signed_duration_since(self.last_active);
        age.num_seconds() > ttl_seconds
    }

    /// Bind the session to a logged-in user
    pub fn attach_identity(&mut self, user_id: Uuid, username: String) {
        self.identity = Some(UserIdentity { user_id, username });
        self.update_activity();
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.user_id)
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.username.as_str())
    }
}

/// Construction parameter for session creation.
///
/// Login normally mints a fresh identifier; signup and login replay also need
/// to install a known identifier (one persisted on the user record), which
/// must fail if that identifier is already live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTemplate {
    /// Mint a fresh random identifier
    Generated,
    /// Use this identifier, failing if it is already taken
    Explicit(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_session_has_no_identity() {
        let session = Session::new("tok".to_string());
        assert!(session.identity.is_none());
        assert!(session.user_id().is_none());
        assert!(session.username().is_none());
    }

    #[test]
    fn test_attach_identity() {
        let mut session = Session::new("tok".to_string());
        let user_id = Uuid::new_v4();
        session.attach_identity(user_id, "edith".to_string());
        assert_eq!(session.user_id(), Some(user_id));
        assert_eq!(session.username(), Some("edith"));
    }

    #[test]
    fn test_expiry_uses_last_active() {
        let mut session = Session::new("tok".to_string());
        assert!(!session.is_expired(60));

        session.last_active = Utc::now() - Duration::seconds(120);
        assert!(session.is_expired(60));
        assert!(!session.is_expired(3600));
    }
}
