//! Action dispatch surface
//!
//! Transport is deliberately thin: an action name plus a parameter bag
//! arrives as `POST /api/{component}` with a JSON body, the session token
//! rides in the `x-portal-session` header, and a structured envelope goes
//! back. Everything interesting happens in the component dispatchers.

use crate::session::SessionToken;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde_json::Value;

pub mod auth;
pub mod envelope;
pub mod form;
pub mod health;
pub mod task;
pub mod user;

use envelope::{ActionError, ActionOutcome};

/// Header carrying the opaque session token
pub const SESSION_HEADER: &str = "x-portal-session";

/// Route an inbound action to its component dispatcher
pub async fn dispatch(
    State(state): State<AppState>,
    Path(component): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionToken::parse);

    let result = route_action(&state, token.as_ref(), &component, &body).await;
    envelope::respond(result)
}

async fn route_action(
    state: &AppState,
    token: Option<&SessionToken>,
    component: &str,
    body: &Value,
) -> Result<ActionOutcome, ActionError> {
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::InvalidFormat("action is required".to_string()))?;

    match component {
        "auth" => auth::handle_action(state, token, action, body).await,
        "form" => form::handle_action(state, token, action, body).await,
        "task" => task::handle_action(state, token, action, body).await,
        "user" => user::handle_action(state, token, action, body).await,
        other => Err(ActionError::UnsupportedAction(format!("{}/{}", other, action))),
    }
}

/// Required string parameter; missing or empty fails as `InvalidFormat`
pub(crate) fn param_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ActionError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ActionError::InvalidFormat(format!("{} is required", key)))
}

/// Required integer parameter; accepts a JSON number or a numeric string
pub(crate) fn param_i64(params: &Value, key: &str) -> Result<i64, ActionError> {
    let value = params
        .get(key)
        .ok_or_else(|| ActionError::InvalidFormat(format!("{} is required", key)))?;

    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ActionError::InvalidFormat(format!("{} must be an integer", key)))
}
