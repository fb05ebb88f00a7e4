//! Upload policy helpers: MIME allow-list, size limits, risky extensions.

use std::path::Path;

use super::SanitizeError;

/// Extensions flagged to clients as potentially executable.
const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "pif", "msi", "msp", "dll", "cpl", "vbs", "vbe", "js",
    "jse", "wsf", "wsh", "hta", "ps1", "psm1", "reg", "lnk", "jar", "sh", "app", "apk", "deb",
    "rpm", "dmg", "iso",
];

/// Whether `mime` matches an entry of `allowed`.
///
/// Entries match exactly or as a prefix wildcard (`image/*`); `*` and `*/*`
/// match everything. Comparison ignores case and any `; charset=...`
/// parameters. An empty allow-list allows every type.
pub fn mime_allowed(mime: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let essence = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return false;
    }

    allowed.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        if entry == "*" || entry == "*/*" {
            return true;
        }
        match entry.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') => essence.starts_with(prefix),
            _ => essence == entry,
        }
    })
}

/// Validate the declared size of an incoming transfer.
///
/// The size must be stated and positive; a positive `max_bytes` bounds it.
pub fn validate_file_size(size: Option<i64>, max_bytes: i64) -> Result<(), SanitizeError> {
    let size = size.ok_or(SanitizeError::SizeUnknown)?;
    if size <= 0 {
        return Err(SanitizeError::EmptyFile);
    }
    if max_bytes > 0 && size > max_bytes {
        return Err(SanitizeError::FileTooLarge { max: max_bytes });
    }
    Ok(())
}

/// Advisory check for executable-looking extensions.
///
/// This is a display hint for clients, never a reason to refuse an upload.
pub fn is_dangerous_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            DANGEROUS_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Guess a MIME type from a filename, defaulting to `application/octet-stream`.
pub fn detect_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
