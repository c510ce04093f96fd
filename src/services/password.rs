//! Credential hashing
//!
//! Account secrets are stored as Argon2id PHC strings with a fresh random salt
//! per hash. The plaintext is never persisted.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

/// Minimum length accepted for a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id with the crate's default parameters.
///
/// ```ignore
/// use petbeacon::services::password::hash_password;
///
/// let hash = hash_password("correct horse")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse stored password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

/// Verify `password` against `hash`, or against a throwaway hash when there is
/// no stored credential.
///
/// Both branches run a full Argon2 verification, so an unknown identity costs
/// the same time as a wrong password. The throwaway branch is always `false`.
pub fn verify_password_or_dummy(password: &str, hash: Option<&str>) -> Result<bool> {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            let dummy = dummy_hash()?;
            verify_password(password, dummy)?;
            Ok(false)
        }
    }
}

/// Hash with the same parameters as real credentials, computed once per process
pub fn dummy_hash() -> Result<&'static str> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();

    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash.as_str());
    }
    let hash = hash_password("petbeacon-unknown-identity")?;
    Ok(DUMMY_HASH.get_or_init(|| hash).as_str())
}

/// Check a candidate password against the minimum policy
pub fn validate_password_policy(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}
