//! DTO for the custom code availability endpoint.

use serde::Serialize;

use crate::application::services::CodeAvailability;

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    pub code: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<CodeAvailability> for ValidateCodeResponse {
    fn from(availability: CodeAvailability) -> Self {
        Self {
            code: availability.code,
            available: availability.available,
            reason: availability.reason,
        }
    }
}
