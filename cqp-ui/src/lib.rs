//! cqp-ui library - the portal's session-gated workflow engine
//!
//! Participants authenticate (by personal number or username/password),
//! answer an assigned questionnaire with autosave and atomic submission,
//! and move their assigned tasks through the status machine. Everything
//! is reached through the action dispatch surface in [`api`].

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod services;
pub mod session;

use session::SessionStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Live sessions, keyed by opaque token
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Create new application state with the given session timeout
    pub fn new(db: SqlitePool, session_timeout_seconds: i64) -> Self {
        Self {
            db,
            sessions: Arc::new(SessionStore::new(session_timeout_seconds)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route("/api/:component", post(api::dispatch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
