//! Password hashing and verification
//!
//! Identities store `password_hash` + `password_salt` columns; the hash is
//! SHA-256 over salt-then-password, hex encoded. Pure functions only.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random 16-byte salt, hex encoded
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hash a password with the given salt
///
/// # Examples
///
/// ```
/// use cqp_common::auth::hash_password;
///
/// let hash = hash_password("secret", "00ff");
/// assert_eq!(hash.len(), 64); // SHA-256 is 64 hex chars
/// assert_eq!(hash, hash_password("secret", "00ff"));
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify a password against a stored salt + hash pair
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_is_random_hex() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_roundtrip() {
        let salt = generate_salt();
        let hash = hash_password("Correct1!", &salt);
        assert!(verify_password("Correct1!", &salt, &hash));
        assert!(!verify_password("Wrong1!", &salt, &hash));
    }

    #[test]
    fn test_salt_changes_hash() {
        assert_ne!(hash_password("pw", "aa"), hash_password("pw", "bb"));
    }
}
