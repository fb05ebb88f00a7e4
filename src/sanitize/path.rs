//! Virtual path sanitization and traversal detection.

use std::borrow::Cow;

use super::{is_control, SanitizeError, MAX_DECODE_LEVELS, MAX_PATH_BYTES};

/// Reject any traversal sequence in `raw` or its percent-decoded forms.
///
/// The raw string and up to [`MAX_DECODE_LEVELS`] nested decodings are each
/// checked for `../`, `..\` and `..` before any normalization happens, so
/// double-encoded payloads such as `%252e%252e%252f` are caught. A NUL byte
/// hidden behind an encoding is rejected as well.
pub fn validate_no_traversal(raw: &str) -> Result<(), SanitizeError> {
    for form in decoded_forms(raw) {
        if form.contains('\0') {
            return Err(SanitizeError::NullByte);
        }
        let lower = form.to_lowercase();
        if lower.contains("../") || lower.contains("..\\") || lower.contains("..") {
            return Err(SanitizeError::Traversal);
        }
    }
    Ok(())
}

/// The raw input followed by each distinct percent-decoding of it.
fn decoded_forms(raw: &str) -> Vec<String> {
    let mut forms = vec![raw.to_string()];
    for _ in 0..MAX_DECODE_LEVELS {
        let current = forms.last().map(String::as_str).unwrap_or(raw);
        let decoded = match urlencoding::decode_binary(current.as_bytes()) {
            Cow::Borrowed(_) => break,
            Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        };
        if decoded == current {
            break;
        }
        forms.push(decoded);
    }
    forms
}

/// Validate and normalize a virtual path.
///
/// Rejects NUL bytes, control characters, paths longer than
/// [`MAX_PATH_BYTES`] and traversal attempts. The accepted path has forward
/// slashes only, no repeated or trailing slash, and exactly one leading
/// slash; the empty path normalizes to `/`.
///
/// # Examples
///
/// ```
/// use sharevault::sanitize::sanitize_path;
///
/// assert_eq!(sanitize_path("docs//work/").unwrap(), "/docs/work");
/// assert!(sanitize_path("/docs/%2e%2e/secret").is_err());
/// ```
pub fn sanitize_path(raw: &str) -> Result<String, SanitizeError> {
    if raw.contains('\0') {
        return Err(SanitizeError::NullByte);
    }
    if raw.len() > MAX_PATH_BYTES {
        return Err(SanitizeError::PathTooLong);
    }
    if raw.chars().any(is_control) {
        return Err(SanitizeError::ControlCharacter);
    }
    validate_no_traversal(raw)?;

    let normalized = raw.replace('\\', "/");
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Materialized path of `name` under `parent_path` (`None` for the root).
pub fn join_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        None | Some("/") | Some("") => format!("/{name}"),
        Some(parent) => format!("{parent}/{name}"),
    }
}
