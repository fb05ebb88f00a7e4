//! Error types for sharevault.

use thiserror::Error;

/// Message shown for both missing and forbidden resources so callers
/// cannot probe which one they hit.
const UNAVAILABLE_MESSAGE: &str = "the requested resource is unavailable";

/// Message shown for every server-side failure.
const INTERNAL_MESSAGE: &str = "internal error";

/// Common error type for sharevault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Validation error for client input (names, paths, sizes, MIME types).
    #[error("validation error: {0}")]
    Validation(String),

    /// Ownership or scope check failed.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Structural conflict: duplicate name, self-parenting, cyclic move.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Share link past its expiration.
    #[error("share link has expired")]
    Expired,

    /// Object store failure.
    #[error("storage backend error: {0}")]
    Dependency(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure (task join errors, hashing failures).
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Whether the caller can fix the request (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            VaultError::Validation(_)
                | VaultError::Permission(_)
                | VaultError::NotFound(_)
                | VaultError::Conflict(_)
                | VaultError::Expired
        )
    }

    /// Message safe to show to an untrusted caller.
    ///
    /// Internal errors never leak paths or backend details, and
    /// `NotFound`/`Permission` are indistinguishable.
    pub fn public_message(&self) -> String {
        match self {
            VaultError::Validation(msg) => msg.clone(),
            VaultError::Conflict(msg) => msg.clone(),
            VaultError::Expired => self.to_string(),
            VaultError::Permission(_) | VaultError::NotFound(_) => UNAVAILABLE_MESSAGE.to_string(),
            VaultError::Dependency(_)
            | VaultError::Database(_)
            | VaultError::Io(_)
            | VaultError::Config(_)
            | VaultError::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

/// Result type alias for sharevault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
