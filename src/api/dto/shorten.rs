//! DTOs for link shortening endpoint.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::application::services::CreateLink;

/// Request to shorten one URL.
///
/// URL and custom code rules are enforced by the link service; the bounds
/// here only reject payloads that could never be valid.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The URL to shorten. A missing scheme is rejected.
    #[validate(length(min = 1, message = "URL is required"))]
    pub url: String,

    /// Optional custom short code. Empty means a random code.
    #[validate(length(max = 255, message = "Custom code is too long"))]
    pub custom_code: Option<String>,

    /// Optional expiry. After this time the link returns 410 Gone.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<ShortenRequest> for CreateLink {
    fn from(request: ShortenRequest) -> Self {
        CreateLink {
            target_url: request.url,
            custom_code: request.custom_code,
            expires_at: request.expires_at,
        }
    }
}
