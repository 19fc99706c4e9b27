//! Password and API key utilities

use argon2::Argon2;
use argon2::password_hash::Error;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use uuid::Uuid;

/// Generate a new password
pub fn generate() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Generate a new API key
///
/// Plain hex, no dashes, only shown once to the user
pub fn generate_api_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Hash a given secret, password or API key
///
/// # Errors
///
/// Will return `Err` when the hasher rejects the input
pub fn hash(secret: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hashed| hashed.to_string())
}

/// Verify a given secret against a given hash
///
/// An unparsable hash never verifies
pub fn verify(hashed_secret: &str, secret: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed_secret) else {
        tracing::warn!("Stored hash could not be parsed");
        return false;
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}
