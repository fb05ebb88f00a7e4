//! Input sanitization for names and virtual paths.
//!
//! Every directory and file mutation passes its user-supplied name or path
//! through this module first. Dangerous input is rejected with a
//! [`SanitizeError`] rather than silently cleaned, except for directory
//! components in filenames, which are stripped to the base name.

mod filename;
mod path;
mod policy;

pub use filename::sanitize_filename;
pub use path::{join_path, sanitize_path, validate_no_traversal};
pub use policy::{detect_mime_type, is_dangerous_extension, mime_allowed, validate_file_size};

use thiserror::Error;

use crate::VaultError;

/// Maximum filename length in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Maximum virtual path length in bytes.
pub const MAX_PATH_BYTES: usize = 1024;

/// Number of nested percent-decoding passes applied before traversal checks.
pub const MAX_DECODE_LEVELS: usize = 3;

/// Sanitization failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// Name is empty (or empty once directory components are stripped).
    #[error("name cannot be empty")]
    Empty,

    /// Input contains a NUL byte.
    #[error("null bytes are not allowed")]
    NullByte,

    /// Input contains an ASCII control character.
    #[error("control characters are not allowed")]
    ControlCharacter,

    /// Name is `.` or `..`.
    #[error("'.' and '..' are not valid names")]
    ReservedName,

    /// Filename exceeds the byte limit.
    #[error("filename must be at most {MAX_FILENAME_BYTES} bytes")]
    FilenameTooLong,

    /// Path exceeds the byte limit.
    #[error("path must be at most {MAX_PATH_BYTES} bytes")]
    PathTooLong,

    /// Path contains a traversal sequence (raw or percent-encoded).
    #[error("path traversal is not allowed")]
    Traversal,

    /// Size missing where a transfer is expected.
    #[error("file size must be specified")]
    SizeUnknown,

    /// Size zero or negative where a transfer is expected.
    #[error("file is empty")]
    EmptyFile,

    /// Size exceeds the configured maximum.
    #[error("file exceeds the maximum size of {max} bytes")]
    FileTooLarge {
        /// Configured limit in bytes.
        max: i64,
    },

    /// MIME type not on the allow-list.
    #[error("file type is not allowed")]
    MimeNotAllowed,
}

impl From<SanitizeError> for VaultError {
    fn from(e: SanitizeError) -> Self {
        VaultError::Validation(e.to_string())
    }
}

/// Whether `c` is an ASCII control character (0-31 or 127).
pub(crate) fn is_control(c: char) -> bool {
    (c as u32) < 0x20 || c as u32 == 0x7f
}
