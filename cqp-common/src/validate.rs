//! Pure input validators for login identifiers, passwords and usernames
//!
//! This module contains ONLY pure functions. No database or HTTP framework
//! dependencies - those live in the service crates.

use crate::db::models::IdKind;

/// Punctuation accepted as the "symbol" class in login password policy
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:'\",.<>/?\\|`~";

/// First policy rule a login password fails, if any
///
/// Rules are checked in a fixed order and the first failure wins -
/// callers report exactly one weakness, never an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordWeakness {
    TooShort,
    NoUppercase,
    NoDigit,
    NoSymbol,
}

impl std::fmt::Display for PasswordWeakness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordWeakness::TooShort => write!(f, "password must be at least 8 characters"),
            PasswordWeakness::NoUppercase => {
                write!(f, "password must contain an uppercase letter")
            }
            PasswordWeakness::NoDigit => write!(f, "password must contain a digit"),
            PasswordWeakness::NoSymbol => write!(f, "password must contain a symbol"),
        }
    }
}

/// Validate a credential-method login password
///
/// Order: length >= 8, then uppercase, then digit, then symbol.
///
/// # Examples
///
/// ```
/// use cqp_common::validate::{check_login_password, PasswordWeakness};
///
/// assert!(check_login_password("Abcdef1!").is_ok());
/// assert_eq!(check_login_password("Ab1!"), Err(PasswordWeakness::TooShort));
/// assert_eq!(check_login_password("abcdefg1!"), Err(PasswordWeakness::NoUppercase));
/// ```
pub fn check_login_password(password: &str) -> Result<(), PasswordWeakness> {
    if password.chars().count() < 8 {
        return Err(PasswordWeakness::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordWeakness::NoUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordWeakness::NoDigit);
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(PasswordWeakness::NoSymbol);
    }
    Ok(())
}

/// Minimum length check for newly stored passwords (update/setup paths)
pub fn is_acceptable_new_password(password: &str) -> bool {
    password.chars().count() >= 6
}

/// Well-formed email check for the credential login identifier
///
/// Intentionally conservative: one '@', non-empty local part, domain with
/// at least one '.' separating non-empty labels, no whitespace.
pub fn is_well_formed_email(identifier: &str) -> bool {
    if identifier.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = identifier.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = match parts.next() {
        Some(d) => d,
        None => return false,
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty())
}

/// Classify an all-digit personal number by its length
///
/// Returns `None` when the input is not all digits or the digit count is
/// neither 7 nor 9.
pub fn classify_personal_number(input: &str) -> Option<IdKind> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match input.len() {
        7 => Some(IdKind::Short),
        9 => Some(IdKind::Long),
        _ => None,
    }
}

/// Username rule for `update_username`: 3-20 ASCII letters/digits/underscore
pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=20).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Username rule for `setup_credentials`: at least 3 characters drawn from
/// ASCII letters/digits/underscore or the Hebrew alphabet
pub fn is_valid_setup_username(username: &str) -> bool {
    username.chars().count() >= 3
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || is_hebrew_letter(c))
}

fn is_hebrew_letter(c: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

// ========================================
// Tests
// ========================================
