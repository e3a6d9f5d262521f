//! Activity Log: append-only record of user actions
//!
//! Written by every mutating action, consumed by none of the other
//! components. A failed append must not fail the request it describes,
//! so errors degrade to a warning.

use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Append one entry. Best-effort: storage errors are logged and swallowed.
pub async fn log_action(pool: &SqlitePool, identity_id: Option<i64>, action: &str, detail: &str) {
    let result = sqlx::query(
        "INSERT INTO activity_log (id, identity_id, action, detail) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(identity_id)
    .bind(action)
    .bind(detail)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(action, "failed to append activity log entry: {}", e);
    }
}
