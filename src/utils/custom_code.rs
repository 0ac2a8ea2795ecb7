//! Validation for caller-supplied custom codes.

use regex::Regex;
use std::sync::LazyLock;

/// Shortest custom code accepted.
pub const MIN_CUSTOM_CODE_LENGTH: usize = 2;

/// Longest custom code accepted, and the ceiling for the configured maximum.
pub const MAX_CUSTOM_CODE_LENGTH: usize = 50;

/// Codes that can never be claimed, compared case-insensitively.
///
/// Includes every top-level static route segment (`api`, `health`), which
/// would shadow a link with the same code. Operators can reserve more codes
/// at runtime; those live in the store.
pub const RESERVED_CODES: &[&str] = &[
    "api",
    "www",
    "admin",
    "root",
    "null",
    "undefined",
    "health",
];

static CUSTOM_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomCodeError {
    #[error("Custom code must be at least {min} characters")]
    TooShort { min: usize, actual: usize },

    #[error("Custom code must be at most {max} characters")]
    TooLong { max: usize, actual: usize },

    #[error("Custom code may only contain letters, digits, '-' and '_'")]
    InvalidFormat,

    #[error("Custom code '{0}' is reserved")]
    Reserved(String),
}

/// Validates custom codes against a configured maximum length.
#[derive(Debug, Clone, Copy)]
pub struct CustomCodeValidator {
    max_length: usize,
}

impl CustomCodeValidator {
    /// Creates a validator; `max_length` is clamped to `2..=50`.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.clamp(MIN_CUSTOM_CODE_LENGTH, MAX_CUSTOM_CODE_LENGTH),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validates `code`.
    ///
    /// An empty code is accepted and means "no preference": the caller falls
    /// back to a generated code. Availability is not checked here.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule: length, character set, then the fixed
    /// reserved list.
    pub fn validate(&self, code: &str) -> Result<(), CustomCodeError> {
        if code.is_empty() {
            return Ok(());
        }

        self.check_shape(code)?;

        if is_reserved(code) {
            return Err(CustomCodeError::Reserved(code.to_string()));
        }

        Ok(())
    }

    /// Length and character-set checks only.
    ///
    /// This is what decides whether a path segment may be looked up at all.
    pub fn check_shape(&self, code: &str) -> Result<(), CustomCodeError> {
        let length = code.chars().count();

        if length < MIN_CUSTOM_CODE_LENGTH {
            return Err(CustomCodeError::TooShort {
                min: MIN_CUSTOM_CODE_LENGTH,
                actual: length,
            });
        }

        if length > self.max_length {
            return Err(CustomCodeError::TooLong {
                max: self.max_length,
                actual: length,
            });
        }

        if !CUSTOM_CODE_REGEX.is_match(code) {
            return Err(CustomCodeError::InvalidFormat);
        }

        Ok(())
    }
}

impl Default for CustomCodeValidator {
    fn default() -> Self {
        Self::new(MAX_CUSTOM_CODE_LENGTH)
    }
}

/// Validates `code` with the default length limits.
///
/// # Errors
///
/// See [`CustomCodeValidator::validate`].
pub fn validate_custom_code(code: &str) -> Result<(), CustomCodeError> {
    CustomCodeValidator::default().validate(code)
}

/// Whether `code` is in the fixed reserved list.
pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}
