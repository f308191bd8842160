//! Password hashing and verification using Argon2
//!
//! Hashes are stored as PHC strings, which carry their own salt and
//! parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{ApiError, ApiResult};

/// Length of generated member passwords.
pub const GENERATED_PASSWORD_LEN: usize = 12;

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash.
///
/// A user without a stored hash can never log in.
pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    if hash.is_empty() {
        return Ok(false);
    }
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ApiError::internal_error(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random alphanumeric password for generated users.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
