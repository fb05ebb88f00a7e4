//! Share token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

/// Shortest token accepted for lookup (16 bytes, base64url).
const MIN_TOKEN_LENGTH: usize = 22;

/// Longest token accepted for lookup.
const MAX_TOKEN_LENGTH: usize = 256;

/// Characters shown when a token appears in logs.
const LOG_PREFIX_LENGTH: usize = 6;

/// Generate a token from `bytes` bytes of OS randomness, base64url without
/// padding. 32 bytes yield a 43-character token.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Whether `token` could have been produced by [`generate_token`].
///
/// Used to reject garbage before it reaches the database.
pub fn is_well_formed(token: &str) -> bool {
    (MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Log-safe form of a token.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(LOG_PREFIX_LENGTH).collect();
    format!("{prefix}...")
}
