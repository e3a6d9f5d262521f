//! Task State Machine: per-assignment status plus the paired progress
//! record whose fields depend on the transition taken.

use crate::api::envelope::ActionError;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

/// The six accepted status values
pub const ALLOWED_STATUSES: [&str; 6] = [
    "pending",
    "in_progress",
    "completed",
    "needs_review",
    "approved",
    "rejected",
];

/// Single policy point for status validation.
///
/// Any allow-listed value is accepted as a target from any current state;
/// predecessor ordering is deliberately not enforced. Substituting a
/// transition table here would tighten the machine without touching
/// callers.
pub fn is_allowed_status(status: &str) -> bool {
    ALLOWED_STATUSES.contains(&status)
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Apply a status transition to an assigned task.
///
/// Order of checks: allow-list, existence, ownership. The status column is
/// updated unconditionally, then the progress record is upserted with
/// transition-dependent fields.
pub async fn set_status(
    pool: &SqlitePool,
    assigned_task_id: i64,
    identity_id: i64,
    new_status: &str,
) -> Result<Value, ActionError> {
    if !is_allowed_status(new_status) {
        return Err(ActionError::InvalidStatus(new_status.to_string()));
    }

    let owner: Option<(i64,)> =
        sqlx::query_as("SELECT identity_id FROM assigned_tasks WHERE id = ?")
            .bind(assigned_task_id)
            .fetch_optional(pool)
            .await?;

    let owner_id = match owner {
        Some((id,)) => id,
        None => return Err(ActionError::NotFound("task".to_string())),
    };
    if owner_id != identity_id {
        return Err(ActionError::NotOwner);
    }

    let now = now_stamp();
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE assigned_tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(new_status)
        .bind(&now)
        .bind(assigned_task_id)
        .execute(&mut *tx)
        .await?;

    match new_status {
        "in_progress" => {
            // First entry wins: started_at is never overwritten
            sqlx::query(
                r#"
                INSERT INTO task_progress (assigned_task_id, started_at, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(assigned_task_id) DO UPDATE SET
                    started_at = COALESCE(task_progress.started_at, excluded.started_at),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(assigned_task_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        "needs_review" | "completed" => {
            sqlx::query(
                r#"
                INSERT INTO task_progress (assigned_task_id, completed_at, progress_percentage, updated_at)
                VALUES (?, ?, 100, ?)
                ON CONFLICT(assigned_task_id) DO UPDATE SET
                    completed_at = excluded.completed_at,
                    progress_percentage = 100,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(assigned_task_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        _ => {
            // Timestamps untouched for the remaining transitions
            sqlx::query(
                r#"
                INSERT INTO task_progress (assigned_task_id, updated_at)
                VALUES (?, ?)
                ON CONFLICT(assigned_task_id) DO UPDATE SET
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(assigned_task_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    info!(assigned_task_id, identity_id, new_status, "task status updated");

    Ok(json!({
        "task_id": assigned_task_id,
        "status": new_status,
    }))
}

type TaskRow = (
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
);

const TASK_QUERY: &str = r#"
SELECT t.id, d.title, d.description, t.status, t.due_date, t.priority, t.admin_notes,
       p.started_at, p.completed_at, p.progress_percentage, p.review_notes
FROM assigned_tasks t
JOIN task_definitions d ON d.id = t.task_definition_id
LEFT JOIN task_progress p ON p.assigned_task_id = t.id
"#;

fn task_row_to_json(row: TaskRow) -> Value {
    let (
        id,
        title,
        description,
        status,
        due_date,
        priority,
        admin_notes,
        started_at,
        completed_at,
        progress_percentage,
        review_notes,
    ) = row;
    json!({
        "id": id,
        "title": title,
        "description": description,
        "status": status,
        "due_date": due_date,
        "priority": priority,
        "admin_notes": admin_notes,
        "progress": {
            "started_at": started_at,
            "completed_at": completed_at,
            "progress_percentage": progress_percentage.unwrap_or(0),
            "review_notes": review_notes,
        },
    })
}

/// All of an identity's assigned tasks with their progress, plus counts
pub async fn get_dashboard(pool: &SqlitePool, identity_id: i64) -> Result<Value, ActionError> {
    let rows: Vec<TaskRow> = sqlx::query_as(&format!(
        "{} WHERE t.identity_id = ? ORDER BY t.due_date IS NULL, t.due_date, t.id",
        TASK_QUERY
    ))
    .bind(identity_id)
    .fetch_all(pool)
    .await?;

    let total = rows.len();
    let completed = rows
        .iter()
        .filter(|row| matches!(row.3.as_str(), "completed" | "approved"))
        .count();
    let tasks: Vec<Value> = rows.into_iter().map(task_row_to_json).collect();

    Ok(json!({
        "tasks": tasks,
        "summary": {
            "total": total,
            "completed": completed,
        },
    }))
}

/// One assigned task by id, with ownership enforced
pub async fn get_task_detail(
    pool: &SqlitePool,
    assigned_task_id: i64,
    identity_id: i64,
) -> Result<Value, ActionError> {
    // Ownership is checked against the stored identity, not folded into the
    // WHERE clause, so a foreign task yields NotOwner rather than NotFound.
    let owner: Option<(i64,)> =
        sqlx::query_as("SELECT identity_id FROM assigned_tasks WHERE id = ?")
            .bind(assigned_task_id)
            .fetch_optional(pool)
            .await?;

    match owner {
        None => return Err(ActionError::NotFound("task".to_string())),
        Some((owner_id,)) if owner_id != identity_id => return Err(ActionError::NotOwner),
        Some(_) => {}
    }

    let row: Option<TaskRow> = sqlx::query_as(&format!("{} WHERE t.id = ?", TASK_QUERY))
        .bind(assigned_task_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(task) => Ok(task_row_to_json(task)),
        None => Err(ActionError::NotFound("task".to_string())),
    }
}
