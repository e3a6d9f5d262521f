//! Form component actions: get_questions, submit, auto_save
//!
//! All three are session-guarded; the form id always comes from the
//! session, never from the caller.

use crate::api::envelope::{ActionError, ActionOutcome};
use crate::api::param_i64;
use crate::services::{activity_log, answer_ledger};
use crate::services::answer_ledger::{AnswerValue, WriteSource};
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
        "get_questions" => get_questions(state, token).await,
        "submit" => submit(state, token, params).await,
        "auto_save" => auto_save(state, token, params).await,
        other => Err(ActionError::UnsupportedAction(format!("form/{}", other))),
    }
}

async fn get_questions(
    state: &AppState,
    token: Option<&SessionToken>,
) -> Result<ActionOutcome, ActionError> {
    let active = state.sessions.guard(token).await?;

    let rows: Vec<(i64, String, String, Option<String>, bool, i64)> = sqlx::query_as(
        "SELECT id, label, kind, options, is_required, sort_order FROM questions
         WHERE form_id = ? ORDER BY sort_order, id",
    )
    .bind(active.assigned_form_id)
    .fetch_all(&state.db)
    .await?;

    let questions: Vec<Value> = rows
        .into_iter()
        .map(|(id, label, kind, options, is_required, sort_order)| {
            let options = options
                .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
                .unwrap_or(Value::Null);
            json!({
                "id": id,
                "label": label,
                "kind": kind,
                "options": options,
                "is_required": is_required,
                "sort_order": sort_order,
            })
        })
        .collect();

    Ok(ActionOutcome::new(json!({
        "form_id": active.assigned_form_id,
        "questions": questions,
    })))
}

/// Full submission: resolve every entry first, then commit the batch in
/// one transaction. A single failure rolls back all of it.
async fn submit(
    state: &AppState,
    token: Option<&SessionToken>,
    params: &Value,
) -> Result<ActionOutcome, ActionError> {
    let active = state.sessions.guard(token).await?;

    let form_data = params
        .get("form_data")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ActionError::InvalidFormat("form_data must be an object of answers".to_string())
        })?;

    let kinds = answer_ledger::load_question_kinds(&state.db, active.assigned_form_id).await?;

    // Collect all write intents before touching storage
    let mut entries = Vec::with_capacity(form_data.len());
    for (raw_id, raw_value) in form_data {
        let question_id: i64 = raw_id.parse().map_err(|_| {
            ActionError::InvalidFormat(format!("question id '{}' is not numeric", raw_id))
        })?;
        let kind = kinds
            .get(&question_id)
            .copied()
            .ok_or_else(|| ActionError::NotFound("question".to_string()))?;
        entries.push((question_id, AnswerValue::from_submitted(kind, raw_value)));
    }

    let submitted =
        answer_ledger::submit_batch(&state.db, active.identity_id, active.assigned_form_id, &entries)
            .await?;

    if let Some(token) = token {
        state.sessions.clear_cache(token).await;
    }
    activity_log::log_action(
        &state.db,
        Some(active.identity_id),
        "form_submit",
        &format!("{} answers", submitted),
    )
    .await;

    Ok(ActionOutcome::with_message(
        json!({ "submitted": submitted }),
        "answers submitted",
    ))
}

/// Incremental autosave: one answer, no batch semantics
async fn auto_save(
    state: &AppState,
    token: Option<&SessionToken>,
    params: &Value,
) -> Result<ActionOutcome, ActionError> {
    let active = state.sessions.guard(token).await?;

    let question_id = param_i64(params, "question_id")?;
    let raw_value = params
        .get("answer_value")
        .ok_or_else(|| ActionError::InvalidFormat("answer_value is required".to_string()))?;

    let kinds = answer_ledger::load_question_kinds(&state.db, active.assigned_form_id).await?;
    let kind = kinds
        .get(&question_id)
        .copied()
        .ok_or_else(|| ActionError::NotFound("question".to_string()))?;

    let value = AnswerValue::from_submitted(kind, raw_value);
    answer_ledger::upsert_answer(
        &state.db,
        active.identity_id,
        question_id,
        active.assigned_form_id,
        &value,
        WriteSource::Autosave,
    )
    .await?;

    if let Some(token) = token {
        state.sessions.clear_cache(token).await;
    }
    activity_log::log_action(
        &state.db,
        Some(active.identity_id),
        "answer_autosave",
        &format!("question {}", question_id),
    )
    .await;

    Ok(ActionOutcome::new(json!({
        "saved": true,
        "question_id": question_id,
    })))
}
