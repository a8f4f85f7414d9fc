//! Password hashing and verification.
//!
//! Credentials are stored as salted Argon2id hashes in PHC string format.
//! Verification is delegated to the argon2 crate, which compares in constant
//! time.

use crate::error::{CoreError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| CoreError::Credential(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a plaintext password against a stored PHC hash string.
///
/// An unparseable stored hash verifies as false rather than erroring; a
/// corrupt credential must never let anyone in.
pub fn verify_password(stored: &str, plain: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("admin123").unwrap();
        assert!(verify_password(&hash, "admin123"));
        assert!(!verify_password(&hash, "admin124"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_stored_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
