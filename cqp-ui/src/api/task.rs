//! Task component actions: get_dashboard, get_task_detail, update_task_status

use crate::api::envelope::{ActionError, ActionOutcome};
use crate::api::{param_i64, param_str};
use crate::services::{activity_log, task_status};
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
        "get_dashboard" => {
            let active = state.sessions.guard(token).await?;
            let data = task_status::get_dashboard(&state.db, active.identity_id).await?;
            Ok(ActionOutcome::new(data))
        }
        "get_task_detail" => {
            let active = state.sessions.guard(token).await?;
            let task_id = param_i64(params, "user_task_id")?;
            let data = task_status::get_task_detail(&state.db, task_id, active.identity_id).await?;
            Ok(ActionOutcome::new(data))
        }
        "update_task_status" => {
            let active = state.sessions.guard(token).await?;
            let task_id = param_i64(params, "user_task_id")?;
            let new_status = param_str(params, "status")?;

            let data =
                task_status::set_status(&state.db, task_id, active.identity_id, new_status).await?;

            activity_log::log_action(
                &state.db,
                Some(active.identity_id),
                "task_status_update",
                &format!("task {} -> {}", task_id, new_status),
            )
            .await;

            Ok(ActionOutcome::with_message(data, "task status updated"))
        }
        other => Err(ActionError::UnsupportedAction(format!("task/{}", other))),
    }
}
