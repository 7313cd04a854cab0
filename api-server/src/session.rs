// api-server/src/session.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use common::models::session::{Session, SessionTemplate};
use common::SessionConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::utils::token::create_session_token;

// Cookie name for session tracking ("antique furniture project session id")
pub const SESSION_COOKIE_NAME: &str = "afpsid";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} already exists")]
    AlreadyExists(String),
}

/// Sole authority over the live-session table. Constructed once in `main`
/// and shared with handlers through `web::Data`; all access goes through
/// the concurrency-safe map, so callers never take an outer lock.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    // Idle lifetime in seconds
    ttl_secs: i64,
}

impl SessionManager {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_secs: config.ttl_secs,
        }
    }

    /// Create a session from the template and insert it into the store.
    ///
    /// Generated identifiers come from a 256-bit hash source and are not
    /// checked against existing entries; the collision odds are negligible.
    /// Explicit identifiers go through a single atomic check-then-insert so
    /// two concurrent calls with the same id cannot both succeed.
    pub fn create_session(&self, template: SessionTemplate) -> Result<Session, SessionError> {
        match template {
            SessionTemplate::Generated => {
                let id = create_session_token();
                let session = Session::new(id.clone());
                self.sessions.insert(id, session.clone());
                tracing::debug!("Created session with generated id");
                Ok(session)
            }
            SessionTemplate::Explicit(id) => match self.sessions.entry(id) {
                Entry::Occupied(entry) => {
                    tracing::warn!("Refused to create session, id already live");
                    Err(SessionError::AlreadyExists(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    let session = Session::new(entry.key().clone());
                    entry.insert(session.clone());
                    tracing::debug!("Created session with explicit id");
                    Ok(session)
                }
            },
        }
    }

    /// Look up a live session by id, refreshing its activity timestamp.
    /// Never creates anything; absent and idle-expired ids both come back
    /// as `None`.
    pub fn get_session(&self, id: &str) -> Option<Session> {
        {
            let mut entry = self.sessions.get_mut(id)?;
            let session = entry.value_mut();
            if !session.is_expired(self.ttl_secs) {
                session.update_activity();
                return Some(session.clone());
            }
        }
        // Expired: the entry guard is dropped before eviction
        self.evict_if_expired(id);
        None
    }

    /// Remove the entry only if it is still expired at removal time. The id
    /// may have been deleted and re-created live since expiry was observed;
    /// that session must survive.
    fn evict_if_expired(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, session| session.is_expired(self.ttl_secs))
            .is_some();
        if removed {
            tracing::debug!("Session expired: {}", id);
        }
        removed
    }

    /// Remove a session. Idempotent; removing an absent id is a quiet no-op.
    /// Returns whether an entry was actually removed.
    pub fn delete_session(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::info!("Session invalidated");
        }
        removed
    }

    /// Bind a logged-in user to an existing session, returning the updated
    /// session. `None` when the session is no longer live.
    pub fn attach_identity(&self, id: &str, user_id: Uuid, username: &str) -> Option<Session> {
        let mut entry = self.sessions.get_mut(id)?;
        let session = entry.value_mut();
        session.attach_identity(user_id, username.to_string());
        Some(session.clone())
    }

    /// Pull the session id out of the request's cookie. `None` when the
    /// credential is absent.
    pub fn resolve_from_request(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(SESSION_COOKIE_NAME)
            .map(|cookie| cookie.value().to_string())
    }

    /// Cookie presence plus a live store entry; both or nothing.
    pub fn is_authenticated(&self, req: &HttpRequest) -> Option<Session> {
        let id = self.resolve_from_request(req)?;
        self.get_session(&id)
    }

    /// Evict sessions idle past the TTL. Called from the background sweep.
    pub fn remove_expired(&self) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                if entry.value().is_expired(self.ttl_secs) {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let mut removed = 0;
        for id in expired {
            if self.evict_if_expired(&id) {
                removed += 1;
            }
        }
        removed
    }
}

/// Build the login cookie carrying the session id
pub fn session_cookie<'a>(id: &'a str, config: &SessionConfig) -> Cookie<'a> {
    Cookie::build(SESSION_COOKIE_NAME, id)
        .path("/")
        .secure(config.cookie_secure)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(config.ttl_secs))
        .finish()
}

/// Empty, instantly-expiring cookie used to clear the session on logout
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME, "")
        .path("/")
        .max_age(CookieDuration::seconds(0))
        .finish()
}
