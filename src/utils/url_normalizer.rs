//! Target URL validation and normalization.
//!
//! Validation runs on the raw input a caller submits; normalization produces the
//! canonical form that is persisted. Normalizing an already normalized URL
//! returns it unchanged.

use regex::Regex;
use std::sync::LazyLock;
use url::{Position, Url};

/// Maximum accepted URL length in bytes.
pub const MAX_URL_LENGTH: usize = 2048;

static SCRIPT_SCHEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(javascript|data|vbscript):").unwrap());

static SUSPICIOUS_EXTENSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(exe|bat|scr|zip)($|\?|#)").unwrap());

/// Reasons a target URL is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    Invalid(String),

    #[error("URL is too long ({actual} bytes, max {max})")]
    TooLong { max: usize, actual: usize },

    #[error("URL matches a blocked pattern")]
    Malicious,
}

/// Checks that `input` is an acceptable redirect target.
///
/// # Rules
///
/// 1. Non-empty and at most [`MAX_URL_LENGTH`] bytes
/// 2. Parses as an absolute `http` or `https` URL with a host
/// 3. Contains no script scheme (`javascript:`, `data:`, `vbscript:`) and does
///    not point at an executable or archive (`.exe`, `.bat`, `.scr`, `.zip`)
///
/// # Errors
///
/// Returns the first rule that fails as a [`UrlValidationError`].
pub fn validate_url(input: &str) -> Result<(), UrlValidationError> {
    if input.is_empty() {
        return Err(UrlValidationError::Invalid("URL is empty".to_string()));
    }

    if input.len() > MAX_URL_LENGTH {
        return Err(UrlValidationError::TooLong {
            max: MAX_URL_LENGTH,
            actual: input.len(),
        });
    }

    let parsed = Url::parse(input).map_err(|e| UrlValidationError::Invalid(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlValidationError::Invalid(format!(
            "scheme '{}' is not allowed",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::Invalid("URL has no host".to_string()));
    }

    if SCRIPT_SCHEME_PATTERN.is_match(input) || SUSPICIOUS_EXTENSION_PATTERN.is_match(input) {
        return Err(UrlValidationError::Malicious);
    }

    Ok(())
}

/// Normalizes a URL to its canonical stored form.
///
/// # Normalization Rules
///
/// 1. **Scheme**: `https://` is prepended when no `http://` or `https://` prefix exists
/// 2. **Host**: lowercased
/// 3. **Default ports**: `:80` for http and `:443` for https are removed
/// 4. **Root path**: a path of exactly `/` is dropped
/// 5. **Query and fragment**: preserved
///
/// # Errors
///
/// Returns [`UrlValidationError::Invalid`] if the input cannot be parsed.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_url("example.com").unwrap(), "https://example.com");
/// assert_eq!(normalize_url("HTTP://EXAMPLE.COM:80/").unwrap(), "http://example.com");
/// ```
pub fn normalize_url(input: &str) -> Result<String, UrlValidationError> {
    let trimmed = input.trim();
    let lowered = trimmed.to_ascii_lowercase();

    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed =
        Url::parse(&with_scheme).map_err(|e| UrlValidationError::Invalid(e.to_string()))?;

    let Some(host) = parsed.host_str() else {
        return Err(UrlValidationError::Invalid("URL has no host".to_string()));
    };

    // Url already drops default ports; the host is lowercased explicitly for
    // hosts it does not canonicalize itself.
    let mut normalized = format!("{}://", parsed.scheme());
    let authority = &parsed[Position::BeforeUsername..Position::AfterPort];
    match authority.rfind('@') {
        Some(at) => {
            normalized.push_str(&authority[..=at]);
            normalized.push_str(&host.to_ascii_lowercase());
        }
        None => normalized.push_str(&host.to_ascii_lowercase()),
    }
    if let Some(port) = parsed.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }

    if parsed.path() != "/" {
        normalized.push_str(parsed.path());
    }
    normalized.push_str(&parsed[Position::AfterPath..]);

    Ok(normalized)
}
