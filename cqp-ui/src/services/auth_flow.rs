//! Auth Flow Orchestrator: the two login methods, the session probe, and
//! logout. Composes the Credential Store with the Session Manager.

use crate::api::envelope::ActionError;
use crate::services::{activity_log, answer_ledger, credentials};
use crate::session::{Session, SessionStatus, SessionStore, SessionToken};
use cqp_common::db::get_setting_i64;
use cqp_common::db::models::{Identity, IdKind};
use cqp_common::{auth, validate};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

/// Parameters accepted by the `login` action
#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Bare personal-number identifier for the numeric method
    #[serde(default)]
    pub tz: Option<String>,
}

/// Post-login routing decision for the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingHint {
    Proceed,
    NeedsCredentialSetup,
}

impl RoutingHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingHint::Proceed => "proceed",
            RoutingHint::NeedsCredentialSetup => "needs-credential-setup",
        }
    }
}

enum LoginMethod {
    Credential,
    Numeric,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Log a participant in via whichever method's inputs are present.
///
/// Returns the identity id, a routing hint, and the freshly minted
/// session token.
pub async fn login(
    pool: &SqlitePool,
    sessions: &SessionStore,
    params: &LoginParams,
) -> Result<Value, ActionError> {
    let (identity, method) = match (
        non_empty(&params.username),
        non_empty(&params.password),
        non_empty(&params.tz),
    ) {
        (Some(username), Some(password), _) => (
            resolve_credential(pool, username, password).await?,
            LoginMethod::Credential,
        ),
        (None, None, Some(tz)) | (Some(_), None, Some(tz)) | (None, Some(_), Some(tz)) => {
            (resolve_numeric(pool, tz).await?, LoginMethod::Numeric)
        }
        _ => return Err(ActionError::MissingCredentials),
    };

    credentials::record_login_success(pool, identity.id).await?;

    let form_id = match identity.assigned_form_id {
        Some(id) => id,
        None => get_setting_i64(pool, "default_form_id", 1).await?,
    };

    let mut session = Session::new(identity.id, form_id);
    session.answer_cache = answer_ledger::load_answers(pool, identity.id, form_id).await?;
    let token = sessions.create(session).await;

    let routing_hint = match method {
        LoginMethod::Numeric if !identity.has_credentials() => RoutingHint::NeedsCredentialSetup,
        _ => RoutingHint::Proceed,
    };

    let method_name = match method {
        LoginMethod::Credential => "credential",
        LoginMethod::Numeric => "numeric",
    };
    info!(identity_id = identity.id, method = method_name, "login successful");
    activity_log::log_action(pool, Some(identity.id), "login", method_name).await;

    Ok(json!({
        "identity_id": identity.id,
        "routing_hint": routing_hint.as_str(),
        "session_token": token.to_string(),
    }))
}

/// Credential method: email-shaped identifier + policy-checked password.
///
/// Unknown identifier and failed verification both surface as
/// `InvalidCredentials` so callers cannot enumerate accounts.
async fn resolve_credential(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Identity, ActionError> {
    if !validate::is_well_formed_email(username) {
        return Err(ActionError::InvalidFormat(
            "identifier must be a valid email address".to_string(),
        ));
    }
    if let Err(weakness) = validate::check_login_password(password) {
        return Err(ActionError::WeakPassword(weakness.to_string()));
    }

    let identity = match credentials::find_by_username(pool, username).await? {
        Some(identity) => identity,
        None => return Err(ActionError::InvalidCredentials),
    };

    if identity.is_blocked {
        return Err(ActionError::Blocked);
    }

    let verified = match (&identity.password_hash, &identity.password_salt) {
        (Some(hash), Some(salt)) if !hash.is_empty() => {
            auth::verify_password(password, salt, hash)
        }
        _ => false,
    };

    if !verified {
        credentials::record_login_failure(pool, identity.id).await?;
        return Err(ActionError::InvalidCredentials);
    }

    Ok(identity)
}

/// Numeric method: all-digit identifier of length 7 or 9, checked against
/// the identity's stored kind. Enumeration is permitted here.
async fn resolve_numeric(pool: &SqlitePool, tz: &str) -> Result<Identity, ActionError> {
    let supplied_kind = validate::classify_personal_number(tz).ok_or_else(|| {
        ActionError::InvalidFormat("identifier must be 7 or 9 digits".to_string())
    })?;

    let identity = match credentials::find_by_personal_number(pool, tz).await? {
        Some(identity) => identity,
        None => return Err(ActionError::NotFound("participant".to_string())),
    };

    let stored_kind = identity
        .id_kind
        .as_deref()
        .and_then(IdKind::parse)
        .or_else(|| {
            identity
                .personal_number
                .as_deref()
                .and_then(validate::classify_personal_number)
        });

    if let Some(stored) = stored_kind {
        if stored != supplied_kind {
            return Err(ActionError::IdKindMismatch {
                expected_digits: stored.expected_digits(),
            });
        }
    }

    if identity.is_blocked {
        return Err(ActionError::Blocked);
    }

    Ok(identity)
}

/// Probe the session without failing: reports state as data, refreshing
/// the window and lazily repopulating the answer cache when live.
pub async fn check_session(
    pool: &SqlitePool,
    sessions: &SessionStore,
    token: Option<&SessionToken>,
) -> Result<Value, ActionError> {
    let token = match token {
        Some(t) => t,
        None => return Ok(json!({ "authenticated": false })),
    };

    match sessions.status(Some(token)).await {
        SessionStatus::Missing => Ok(json!({ "authenticated": false })),
        SessionStatus::Expired => Ok(json!({
            "authenticated": false,
            "session_expired": true,
        })),
        SessionStatus::Active(active) => {
            let answers = match sessions.cached_answers(token).await {
                Some(cached) => cached,
                None => {
                    let loaded = answer_ledger::load_answers(
                        pool,
                        active.identity_id,
                        active.assigned_form_id,
                    )
                    .await?;
                    sessions.prime_cache(token, loaded.clone()).await;
                    loaded
                }
            };

            let previous: serde_json::Map<String, Value> = answers
                .iter()
                .map(|(question_id, value)| {
                    (question_id.to_string(), serde_json::to_value(value).unwrap_or(Value::Null))
                })
                .collect();

            Ok(json!({
                "authenticated": true,
                "identity_id": active.identity_id,
                "previous_answers": previous,
            }))
        }
    }
}

/// Destroy the session. Always succeeds.
pub async fn logout(
    pool: &SqlitePool,
    sessions: &SessionStore,
    token: Option<&SessionToken>,
) -> Result<Value, ActionError> {
    if let Some(token) = token {
        if let Some(identity_id) = sessions.destroy(token).await {
            activity_log::log_action(pool, Some(identity_id), "logout", "").await;
        }
    }
    Ok(json!({ "logged_out": true }))
}
