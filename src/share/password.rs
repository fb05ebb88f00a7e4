//! Share password hashing.
//!
//! Uses Argon2id with the work factors from `[shares]`. Verification goes
//! through the hash primitive, so timing does not depend on where the
//! supplied password differs.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::ShareConfig;
use crate::VaultError;

/// Maximum share password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    /// Work factors rejected by the hasher.
    #[error("invalid password hashing parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored hash could not be parsed.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Wrong password.
    #[error("password verification failed")]
    VerificationFailed,
}

impl From<PasswordError> for VaultError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooLong => VaultError::Validation(e.to_string()),
            PasswordError::VerificationFailed => VaultError::Permission(e.to_string()),
            PasswordError::InvalidParams(_) => VaultError::Config(e.to_string()),
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                VaultError::Internal(e.to_string())
            }
        }
    }
}

fn create_argon2(config: &ShareConfig) -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(
        config.password_memory_kib,
        config.password_iterations,
        config.password_parallelism,
        None,
    )
    .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a share password. Returns a PHC string carrying salt and parameters.
///
/// This is deliberately slow; call it from a blocking task.
pub fn hash_password(password: &str, config: &ShareConfig) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = create_argon2(config)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// The parameters are taken from the stored hash, so hashes made under
/// older settings keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> ShareConfig {
        ShareConfig {
            password_memory_kib: 1024,
            password_iterations: 1,
            password_parallelism: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let config = fast_config();
        let hash = hash_password("s3cret", &config).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024"));
        assert!(!hash.contains("s3cret"));

        assert!(verify_password("s3cret", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(PasswordError::VerificationFailed)
        ));
        assert!(verify_password("", &hash).is_err());
    }

    #[test]
    fn test_salted() {
        let config = fast_config();
        let a = hash_password("same", &config).unwrap();
        let b = hash_password("same", &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_too_long() {
        let result = hash_password(&"a".repeat(129), &fast_config());
        assert!(matches!(result, Err(PasswordError::TooLong)));
    }

    #[test]
    fn test_invalid_hash() {
        assert!(matches!(
            verify_password("x", "not_a_valid_hash"),
            Err(PasswordError::InvalidHash)
        ));
    }

    #[test]
    fn test_invalid_params() {
        let config = ShareConfig {
            password_memory_kib: 1,
            ..fast_config()
        };
        assert!(matches!(
            hash_password("x", &config),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let err: VaultError = PasswordError::VerificationFailed.into();
        assert!(matches!(err, VaultError::Permission(_)));
        let err: VaultError = PasswordError::TooLong.into();
        assert!(matches!(err, VaultError::Validation(_)));
    }
}
