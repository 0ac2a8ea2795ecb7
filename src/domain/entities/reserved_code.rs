//! Reserved code entity.

use chrono::{DateTime, Utc};

/// A code that can never be claimed as a custom code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedCode {
    pub code: String,
    pub reason: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input data for reserving a code.
///
/// Codes are stored lowercased so lookups can be case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservedCode {
    pub code: String,
    pub reason: String,
    pub description: Option<String>,
}

impl NewReservedCode {
    pub fn new(code: &str, reason: impl Into<String>, description: Option<String>) -> Self {
        Self {
            code: code.trim().to_lowercase(),
            reason: reason.into(),
            description,
        }
    }
}
