//! User component actions: update_username, update_password, setup_credentials

use crate::api::envelope::{ActionError, ActionOutcome};
use crate::api::param_str;
use crate::services::{activity_log, credentials};
use crate::session::SessionToken;
use crate::AppState;
use serde_json::{json, Value};

pub async fn handle_action(
    state: &AppState,
    token: Option<&SessionToken>,
    action: &str,
    params: &Value,
) -> Result<ActionOutcome, ActionError> {
    match action {
        "update_username" => {
            let active = state.sessions.guard(token).await?;
            let username = param_str(params, "username")?;
            credentials::update_username(&state.db, active.identity_id, username).await?;

            activity_log::log_action(&state.db, Some(active.identity_id), "username_update", "")
                .await;

            Ok(ActionOutcome::with_message(
                json!({ "username": username }),
                "username updated",
            ))
        }
        "update_password" => {
            let active = state.sessions.guard(token).await?;
            let password = param_str(params, "password")?;
            credentials::update_password(&state.db, active.identity_id, password).await?;

            activity_log::log_action(&state.db, Some(active.identity_id), "password_update", "")
                .await;

            Ok(ActionOutcome::with_message(json!({ "updated": true }), "password updated"))
        }
        "setup_credentials" => {
            let active = state.sessions.guard(token).await?;
            let username = param_str(params, "username")?;
            let password = param_str(params, "password")?;
            credentials::setup_credentials(&state.db, active.identity_id, username, password)
                .await?;

            activity_log::log_action(&state.db, Some(active.identity_id), "credentials_setup", "")
                .await;

            Ok(ActionOutcome::with_message(
                json!({ "username": username }),
                "credentials saved",
            ))
        }
        other => Err(ActionError::UnsupportedAction(format!("user/{}", other))),
    }
}
