//! Authenticated-session lifecycle and per-session answer cache
//!
//! Sessions are held in memory, keyed by an opaque UUID token supplied by
//! the caller on each request. There is no ambient session state: every
//! guarded operation receives the token explicitly and re-validates the
//! session on its own (authenticated flag, sliding timeout, refresh) -
//! no cached "still valid" assumption carries across calls.

use crate::services::answer_ledger::AnswerValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque session token handed to the client at login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn parse(value: &str) -> Option<SessionToken> {
        Uuid::parse_str(value).ok().map(SessionToken)
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Server-held context for one logged-in identity
#[derive(Debug, Clone)]
pub struct Session {
    pub identity_id: i64,
    pub authenticated: bool,
    pub login_at: DateTime<Utc>,
    pub assigned_form_id: i64,
    /// Read-through cache of the answer ledger. Not authoritative: cleared
    /// on any answer write and lazily repopulated when empty.
    pub answer_cache: HashMap<i64, AnswerValue>,
}

impl Session {
    pub fn new(identity_id: i64, assigned_form_id: i64) -> Self {
        Session {
            identity_id,
            authenticated: true,
            login_at: Utc::now(),
            assigned_form_id,
            answer_cache: HashMap::new(),
        }
    }
}

/// Why a guarded action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
    /// No session, or the session is no longer authenticated
    Unauthenticated,
    /// The sliding window elapsed; the session stays unauthenticated
    Expired,
}

/// Snapshot of a session that just passed the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSession {
    pub identity_id: i64,
    pub assigned_form_id: i64,
}

/// Result of a non-failing session probe (`check_session`)
#[derive(Debug, Clone, Copy)]
pub enum SessionStatus {
    /// No session for this token, or one that is not authenticated
    Missing,
    /// Timeout observed on this probe; authenticated flipped to false
    Expired,
    Active(ActiveSession),
}

/// Token-keyed store of live sessions with a sliding expiration window
pub struct SessionStore {
    timeout_seconds: i64,
    inner: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(timeout_seconds: i64) -> Self {
        SessionStore {
            timeout_seconds,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a freshly created session and mint its token
    pub async fn create(&self, session: Session) -> SessionToken {
        let token = SessionToken(Uuid::new_v4());
        self.inner.write().await.insert(token.0, session);
        token
    }

    /// Destroy the session unconditionally; succeeds whether or not one existed
    pub async fn destroy(&self, token: &SessionToken) -> Option<i64> {
        self.inner
            .write()
            .await
            .remove(&token.0)
            .map(|s| s.identity_id)
    }

    /// Precondition for every guarded action, re-run on each call:
    /// (a) authenticated, (b) within the sliding window, (c) refresh login_at.
    pub async fn guard(&self, token: Option<&SessionToken>) -> Result<ActiveSession, GuardError> {
        let token = token.ok_or(GuardError::Unauthenticated)?;
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&token.0)
            .ok_or(GuardError::Unauthenticated)?;

        if !session.authenticated {
            return Err(GuardError::Unauthenticated);
        }

        if self.is_expired(session.login_at) {
            session.authenticated = false;
            return Err(GuardError::Expired);
        }

        session.login_at = Utc::now();
        Ok(ActiveSession {
            identity_id: session.identity_id,
            assigned_form_id: session.assigned_form_id,
        })
    }

    /// Non-failing probe used by `check_session`: reports state instead of
    /// erroring, refreshing the window when the session is still live.
    pub async fn status(&self, token: Option<&SessionToken>) -> SessionStatus {
        let token = match token {
            Some(t) => t,
            None => return SessionStatus::Missing,
        };
        let mut sessions = self.inner.write().await;
        let session = match sessions.get_mut(&token.0) {
            Some(s) => s,
            None => return SessionStatus::Missing,
        };

        if !session.authenticated {
            return SessionStatus::Missing;
        }

        if self.is_expired(session.login_at) {
            session.authenticated = false;
            return SessionStatus::Expired;
        }

        session.login_at = Utc::now();
        SessionStatus::Active(ActiveSession {
            identity_id: session.identity_id,
            assigned_form_id: session.assigned_form_id,
        })
    }

    /// Cached answers, or None when the cache is empty and needs repopulation
    pub async fn cached_answers(
        &self,
        token: &SessionToken,
    ) -> Option<HashMap<i64, AnswerValue>> {
        let sessions = self.inner.read().await;
        let session = sessions.get(&token.0)?;
        if session.answer_cache.is_empty() {
            None
        } else {
            Some(session.answer_cache.clone())
        }
    }

    /// Replace the cache after a ledger read
    pub async fn prime_cache(&self, token: &SessionToken, answers: HashMap<i64, AnswerValue>) {
        if let Some(session) = self.inner.write().await.get_mut(&token.0) {
            session.answer_cache = answers;
        }
    }

    /// Invalidate to empty after any answer write
    pub async fn clear_cache(&self, token: &SessionToken) {
        if let Some(session) = self.inner.write().await.get_mut(&token.0) {
            session.answer_cache.clear();
        }
    }

    /// Rewind a session's login stamp. Exists for expiry tests; production
    /// code never moves the stamp backwards.
    pub async fn set_login_at(&self, token: &SessionToken, login_at: DateTime<Utc>) -> bool {
        match self.inner.write().await.get_mut(&token.0) {
            Some(session) => {
                session.login_at = login_at;
                true
            }
            None => false,
        }
    }

    fn is_expired(&self, login_at: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(login_at).num_seconds() > self.timeout_seconds
    }
}
