//! Filename sanitization.

use super::{is_control, SanitizeError, MAX_FILENAME_BYTES};

/// Validate a user-supplied filename and reduce it to its base component.
///
/// NUL bytes and control characters are rejected outright. Directory
/// components (either separator) are stripped, so `../../../etc/passwd`
/// becomes `passwd`. The result is never empty, `.` or `..`, and is at most
/// [`MAX_FILENAME_BYTES`] bytes.
///
/// # Examples
///
/// ```
/// use sharevault::sanitize::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../../etc/passwd").unwrap(), "passwd");
/// assert!(sanitize_filename("evil\0.txt").is_err());
/// ```
pub fn sanitize_filename(raw: &str) -> Result<String, SanitizeError> {
    if raw.contains('\0') {
        return Err(SanitizeError::NullByte);
    }
    if raw.chars().any(is_control) {
        return Err(SanitizeError::ControlCharacter);
    }

    let normalized = raw.replace('\\', "/");
    let base = normalized
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");

    if base.is_empty() {
        return Err(SanitizeError::Empty);
    }
    if base == "." || base == ".." {
        return Err(SanitizeError::ReservedName);
    }
    if base.len() > MAX_FILENAME_BYTES {
        return Err(SanitizeError::FilenameTooLong);
    }

    Ok(base.to_string())
}
