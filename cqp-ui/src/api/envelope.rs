//! Action result envelopes and the portal error taxonomy
//!
//! Every component operation returns `Result<ActionOutcome, ActionError>`;
//! this module translates both arms into the wire envelope
//! `{ok, data?, message?}` plus an HTTP status hint. Callers never match
//! on message strings - the enum is the contract.

use crate::session::GuardError;
use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// User-facing failure kinds
#[derive(Debug, Error)]
pub enum ActionError {
    /// Malformed identifier, email, or parameter shape
    #[error("{0}")]
    InvalidFormat(String),

    /// Password fails the applicable strength rule
    #[error("{0}")]
    WeakPassword(String),

    /// Neither login method's required inputs were present
    #[error("either username and password or a personal number is required")]
    MissingCredentials,

    /// Unknown user and bad password are deliberately indistinguishable
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Personal number resolved but its digit count mismatches the stored kind
    #[error("identifier must be {expected_digits} digits")]
    IdKindMismatch { expected_digits: usize },

    /// Identity is blocked; credentials are irrelevant
    #[error("this account is blocked")]
    Blocked,

    /// No authenticated session for this request
    #[error("not authenticated")]
    Unauthenticated,

    /// Sliding window elapsed; a fresh login is required
    #[error("session expired, please log in again")]
    SessionExpired,

    /// Assigned task belongs to a different identity
    #[error("this task belongs to another participant")]
    NotOwner,

    /// Status value outside the fixed allow-list
    #[error("invalid status value: {0}")]
    InvalidStatus(String),

    /// Task, identity or question not found
    #[error("{0} not found")]
    NotFound(String),

    /// Unique value already taken (username)
    #[error("{0}")]
    Conflict(String),

    /// Unrecognized action name
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// Storage-layer failure; detail is logged, never surfaced
    #[error("temporary storage failure")]
    Persistence(String),
}

impl ActionError {
    /// HTTP status hint carried in the error envelope
    pub fn status_hint(&self) -> StatusCode {
        match self {
            ActionError::InvalidFormat(_)
            | ActionError::WeakPassword(_)
            | ActionError::MissingCredentials
            | ActionError::IdKindMismatch { .. }
            | ActionError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            ActionError::InvalidCredentials
            | ActionError::Unauthenticated
            | ActionError::SessionExpired => StatusCode::UNAUTHORIZED,
            ActionError::Blocked | ActionError::NotOwner => StatusCode::FORBIDDEN,
            ActionError::NotFound(_) | ActionError::UnsupportedAction(_) => StatusCode::NOT_FOUND,
            ActionError::Conflict(_) => StatusCode::CONFLICT,
            ActionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ActionError {
    fn from(e: sqlx::Error) -> Self {
        error!("storage error: {}", e);
        ActionError::Persistence(e.to_string())
    }
}

impl From<cqp_common::Error> for ActionError {
    fn from(e: cqp_common::Error) -> Self {
        error!("storage error: {}", e);
        ActionError::Persistence(e.to_string())
    }
}

impl From<GuardError> for ActionError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Unauthenticated => ActionError::Unauthenticated,
            GuardError::Expired => ActionError::SessionExpired,
        }
    }
}

/// Successful action payload plus an optional human-readable message
#[derive(Debug)]
pub struct ActionOutcome {
    pub data: Value,
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn new(data: Value) -> Self {
        ActionOutcome { data, message: None }
    }

    pub fn with_message(data: Value, message: impl Into<String>) -> Self {
        ActionOutcome {
            data,
            message: Some(message.into()),
        }
    }
}

/// Wire shape for both envelope arms
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let body = Envelope {
            ok: false,
            data: None,
            message: Some(self.to_string()),
        };
        (self.status_hint(), Json(body)).into_response()
    }
}

/// Translate an action result into the HTTP response
pub fn respond(result: Result<ActionOutcome, ActionError>) -> Response {
    match result {
        Ok(outcome) => {
            let body = Envelope {
                ok: true,
                data: Some(outcome.data),
                message: outcome.message,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => e.into_response(),
    }
}
