use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{PomodexError, Result};

/// Hashes a password with a fresh per-credential salt. The returned string
/// encodes the algorithm, parameters and salt, so verification needs only
/// the plaintext and this string.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PomodexError::Backend(format!("hashing password: {e}")))
}

/// Verifies a password against a stored hash in constant time. Any failure
/// mode — wrong password, malformed hash — collapses to `Auth` so callers
/// can't distinguish them.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| PomodexError::Auth)?;
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| PomodexError::Auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
    }

    #[test]
    fn wrong_password_fails_as_auth_error() {
        let hash = hash_password("correct horse battery staple").unwrap();
        let err = verify_password("wrong password", &hash).unwrap_err();
        assert!(matches!(err, PomodexError::Auth));
    }

    #[test]
    fn same_password_hashes_differ_by_salt() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }
}
