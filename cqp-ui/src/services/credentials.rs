//! Credential Store access: identity lookups, login bookkeeping, and the
//! self-service credential operations (username/password updates).

use crate::api::envelope::ActionError;
use chrono::{SecondsFormat, Utc};
use cqp_common::db::models::Identity;
use cqp_common::{auth, validate};
use sqlx::SqlitePool;

type IdentityRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    i64,
    Option<i64>,
);

const IDENTITY_COLUMNS: &str = "id, personal_number, id_kind, username, password_hash, \
     password_salt, full_name, is_blocked, failed_attempts, assigned_form_id";

fn row_to_identity(row: IdentityRow) -> Identity {
    let (
        id,
        personal_number,
        id_kind,
        username,
        password_hash,
        password_salt,
        full_name,
        is_blocked,
        failed_attempts,
        assigned_form_id,
    ) = row;
    Identity {
        id,
        personal_number,
        id_kind,
        username,
        password_hash,
        password_salt,
        full_name,
        is_blocked,
        failed_attempts,
        assigned_form_id,
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lookup for the credential login method
pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Identity>, sqlx::Error> {
    let row: Option<IdentityRow> = sqlx::query_as(&format!(
        "SELECT {} FROM identities WHERE username = ?",
        IDENTITY_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_identity))
}

/// Lookup for the numeric login method.
///
/// Comparison is numeric, so leading zeros in either the stored or the
/// supplied value are insignificant - the digit-length check against the
/// stored kind happens separately in the auth flow.
pub async fn find_by_personal_number(
    pool: &SqlitePool,
    digits: &str,
) -> Result<Option<Identity>, sqlx::Error> {
    let row: Option<IdentityRow> = sqlx::query_as(&format!(
        "SELECT {} FROM identities
         WHERE personal_number IS NOT NULL
           AND CAST(personal_number AS INTEGER) = CAST(? AS INTEGER)",
        IDENTITY_COLUMNS
    ))
    .bind(digits)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_identity))
}

/// Reset the failure counter and stamp the login time
pub async fn record_login_success(pool: &SqlitePool, identity_id: i64) -> Result<(), sqlx::Error> {
    let now = now_stamp();
    sqlx::query(
        "UPDATE identities SET failed_attempts = 0, last_login_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(identity_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count a failed credential-method verification against the identity
pub async fn record_login_failure(pool: &SqlitePool, identity_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE identities SET failed_attempts = failed_attempts + 1, updated_at = ? WHERE id = ?",
    )
    .bind(now_stamp())
    .bind(identity_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn username_taken(
    pool: &SqlitePool,
    username: &str,
    excluding_identity: i64,
) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM identities WHERE username = ? AND id != ?)",
    )
    .bind(username)
    .bind(excluding_identity)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

/// `update_username`: 3-20 ASCII letters, digits or underscores
pub async fn update_username(
    pool: &SqlitePool,
    identity_id: i64,
    username: &str,
) -> Result<(), ActionError> {
    if !validate::is_valid_username(username) {
        return Err(ActionError::InvalidFormat(
            "username must be 3-20 letters, digits or underscores".to_string(),
        ));
    }
    if username_taken(pool, username, identity_id).await? {
        return Err(ActionError::Conflict("username is already taken".to_string()));
    }

    sqlx::query("UPDATE identities SET username = ?, updated_at = ? WHERE id = ?")
        .bind(username)
        .bind(now_stamp())
        .bind(identity_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// `update_password`: minimum 6 characters, stored salted
pub async fn update_password(
    pool: &SqlitePool,
    identity_id: i64,
    password: &str,
) -> Result<(), ActionError> {
    if !validate::is_acceptable_new_password(password) {
        return Err(ActionError::WeakPassword(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_password(password, &salt);

    sqlx::query(
        "UPDATE identities SET password_hash = ?, password_salt = ?, updated_at = ? WHERE id = ?",
    )
    .bind(hash)
    .bind(salt)
    .bind(now_stamp())
    .bind(identity_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// `setup_credentials`: first-time username + password after a numeric
/// login. The username rule here additionally permits Hebrew letters.
pub async fn setup_credentials(
    pool: &SqlitePool,
    identity_id: i64,
    username: &str,
    password: &str,
) -> Result<(), ActionError> {
    if !validate::is_valid_setup_username(username) {
        return Err(ActionError::InvalidFormat(
            "username must be at least 3 letters, digits or underscores".to_string(),
        ));
    }
    if !validate::is_acceptable_new_password(password) {
        return Err(ActionError::WeakPassword(
            "password must be at least 6 characters".to_string(),
        ));
    }
    if username_taken(pool, username, identity_id).await? {
        return Err(ActionError::Conflict("username is already taken".to_string()));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_password(password, &salt);

    sqlx::query(
        "UPDATE identities SET username = ?, password_hash = ?, password_salt = ?, updated_at = ? WHERE id = ?",
    )
    .bind(username)
    .bind(hash)
    .bind(salt)
    .bind(now_stamp())
    .bind(identity_id)
    .execute(pool)
    .await?;

    Ok(())
}
