//! Answer Ledger: idempotent keyed upsert store for question responses
//!
//! Rows are keyed by (identity, question, form) and hold exactly one value
//! representation at a time: scalar text or a JSON-encoded array. The
//! encoding is decided once per write from the question's declared kind,
//! never re-derived at call sites. Autosave writes touch `updated_at`
//! only; submit writes also advance `submitted_at`.

use chrono::{SecondsFormat, Utc};
use cqp_common::db::models::QuestionKind;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::error;

/// A question response, resolved from the question's declared kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Scalar(String),
    MultiSelect(Vec<String>),
}

impl AnswerValue {
    /// Resolve a raw submitted value against the question kind.
    ///
    /// Multi-select kinds pass collections through and wrap bare scalars;
    /// every other kind stores the value as a string.
    pub fn from_submitted(kind: QuestionKind, raw: &Value) -> AnswerValue {
        if kind.is_multi_select() {
            match raw {
                Value::Array(items) => {
                    AnswerValue::MultiSelect(items.iter().map(value_to_string).collect())
                }
                other => AnswerValue::MultiSelect(vec![value_to_string(other)]),
            }
        } else {
            AnswerValue::Scalar(value_to_string(raw))
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Origin of a ledger write; only full submissions stamp `submitted_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    Autosave,
    Submit,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Upsert one answer row on the (identity, question, form) key.
///
/// Insert if absent; on conflict overwrite the matching representation,
/// null the other, and advance `updated_at`. `submitted_at` is preserved
/// across autosave writes.
pub async fn upsert_answer<'e, E>(
    executor: E,
    identity_id: i64,
    question_id: i64,
    form_id: i64,
    value: &AnswerValue,
    source: WriteSource,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let (answer_text, answer_json) = match value {
        AnswerValue::Scalar(text) => (Some(text.clone()), None),
        AnswerValue::MultiSelect(items) => {
            let encoded = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
            (None, Some(encoded))
        }
    };

    let now = now_stamp();
    let submitted_at = match source {
        WriteSource::Submit => Some(now.clone()),
        WriteSource::Autosave => None,
    };

    sqlx::query(
        r#"
        INSERT INTO answers (identity_id, question_id, form_id, answer_text, answer_json, updated_at, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(identity_id, question_id, form_id) DO UPDATE SET
            answer_text = excluded.answer_text,
            answer_json = excluded.answer_json,
            updated_at = excluded.updated_at,
            submitted_at = COALESCE(excluded.submitted_at, answers.submitted_at)
        "#,
    )
    .bind(identity_id)
    .bind(question_id)
    .bind(form_id)
    .bind(answer_text)
    .bind(answer_json)
    .bind(now)
    .bind(submitted_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist a full submission atomically.
///
/// All entries commit in one transaction; any failing write rolls the
/// whole batch back, so a submitted form is never partially persisted.
pub async fn submit_batch(
    pool: &SqlitePool,
    identity_id: i64,
    form_id: i64,
    entries: &[(i64, AnswerValue)],
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (question_id, value) in entries {
        if let Err(e) = upsert_answer(
            &mut *tx,
            identity_id,
            *question_id,
            form_id,
            value,
            WriteSource::Submit,
        )
        .await
        {
            error!(
                identity_id,
                question_id, form_id, "submit batch write failed: {}", e
            );
            // Dropping the transaction rolls back everything written so far
            return Err(e);
        }
    }

    tx.commit().await?;
    Ok(entries.len())
}

/// Load all of an identity's answers for a form, keyed by question id.
///
/// When a row somehow carries both representations the JSON form wins.
pub async fn load_answers(
    pool: &SqlitePool,
    identity_id: i64,
    form_id: i64,
) -> Result<HashMap<i64, AnswerValue>, sqlx::Error> {
    let rows: Vec<(i64, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT question_id, answer_text, answer_json FROM answers
         WHERE identity_id = ? AND form_id = ?",
    )
    .bind(identity_id)
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    let mut answers = HashMap::with_capacity(rows.len());
    for (question_id, text, json) in rows {
        let value = match json {
            Some(encoded) => match serde_json::from_str::<Vec<String>>(&encoded) {
                Ok(items) => AnswerValue::MultiSelect(items),
                Err(_) => AnswerValue::MultiSelect(vec![encoded]),
            },
            None => AnswerValue::Scalar(text.unwrap_or_default()),
        };
        answers.insert(question_id, value);
    }

    Ok(answers)
}

/// Question kinds for a form, for resolving submitted values
pub async fn load_question_kinds(
    pool: &SqlitePool,
    form_id: i64,
) -> Result<HashMap<i64, QuestionKind>, sqlx::Error> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, kind FROM questions WHERE form_id = ?")
            .bind(form_id)
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, kind)| QuestionKind::parse(&kind).map(|k| (id, k)))
        .collect())
}
