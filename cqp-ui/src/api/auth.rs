//! Auth component actions: login, check_session, logout

use crate::api::envelope::{ActionError, ActionOutcome};
use crate::services::auth_flow::{self, LoginParams};
use crate::session::SessionToken;
use crate::AppState;
use serde_json::Value;

pub async fn handle_action(
    state: &AppState,
    token: Option<&SessionToken>,
    action: &str,
    params: &Value,
) -> Result<ActionOutcome, ActionError> {
    match action {
        "login" => {
            let login_params: LoginParams = serde_json::from_value(params.clone())
                .map_err(|_| ActionError::InvalidFormat("malformed login parameters".to_string()))?;
            let data = auth_flow::login(&state.db, &state.sessions, &login_params).await?;
            Ok(ActionOutcome::new(data))
        }
        "check_session" => {
            let data = auth_flow::check_session(&state.db, &state.sessions, token).await?;
            Ok(ActionOutcome::new(data))
        }
        "logout" => {
            let data = auth_flow::logout(&state.db, &state.sessions, token).await?;
            Ok(ActionOutcome::with_message(data, "logged out"))
        }
        other => Err(ActionError::UnsupportedAction(format!("auth/{}", other))),
    }
}
