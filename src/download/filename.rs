//! Filename derivation and sanitization for downloads.
//!
//! Names come from two places: the last segment of the URL text (available
//! before the request is sent) and the `Content-Disposition` response header
//! (authoritative when present). Both pass through [`sanitize`] so the result is
//! always a single, plain directory entry.

use std::sync::LazyLock;

use regex::Regex;

use super::constants::FALLBACK_FILENAME;

/// Any character outside the portable filename set `[A-Za-z0-9._-]`.
#[allow(clippy::expect_used)]
static INVALID_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9._-]").expect("filename regex is valid") // Static pattern, safe to panic
});

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// A name made only of dots (`.`, `..`, ...) would resolve to a directory
/// reference when joined to the output path, so its dots become underscores too.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let sanitized = INVALID_FILENAME_CHARS.replace_all(name, "_");
    if !sanitized.is_empty() && sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len());
    }
    sanitized.into_owned()
}

/// Derives a filename from the text after the last `/` of the URL.
///
/// The query string is part of that text, so `http://x.example/a b?c=1`
/// derives `a_b_c_1`. Falls back to [`FALLBACK_FILENAME`] when there is no
/// `/` or nothing follows it.
#[must_use]
pub fn derive_from_url(url: &str) -> String {
    match url.rfind('/') {
        Some(pos) if pos + 1 < url.len() => sanitize(&url[pos + 1..]),
        _ => FALLBACK_FILENAME.to_string(),
    }
}

/// Derives a sanitized filename from a `Content-Disposition` header value.
///
/// Returns `None` when the header carries no filename or the name sanitizes to
/// nothing.
#[must_use]
pub fn derive_from_header(header: &str) -> Option<String> {
    parse_content_disposition(header)
        .map(|raw| sanitize(&raw))
        .filter(|name| !name.is_empty())
}

/// Extracts the raw filename parameter from a `Content-Disposition` header.
///
/// Handles:
/// - `attachment; filename="example.pdf"` (content up to the closing quote)
/// - `attachment; filename=example.pdf` (content up to `;` or end)
/// - `attachment; filename*=UTF-8''example%20file.pdf` (RFC 5987, preferred)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // charset'language'percent-encoded
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim())
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = &header[pos + 9..];

    let filename = if let Some(quoted) = value.strip_prefix('"') {
        // No closing quote means no usable name.
        &quoted[..quoted.find('"')?]
    } else {
        let end = value.find(';').unwrap_or(value.len());
        value[..end].trim()
    };

    (!filename.is_empty()).then(|| filename.to_string())
}

/// Splits a filename at its last `.` into stem and extension (dot included).
///
/// Without a dot the extension is empty.
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Builds the `index`-th collision candidate: `stem{ext}` for 0, `stem(n){ext}` after.
#[must_use]
pub fn numbered_candidate(stem: &str, ext: &str, index: usize) -> String {
    if index == 0 {
        format!("{stem}{ext}")
    } else {
        format!("{stem}({index}){ext}")
    }
}
