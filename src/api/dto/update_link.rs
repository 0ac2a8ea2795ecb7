//! DTO for the link update endpoint.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::serde_as;
use validator::{Validate, ValidationError};

use crate::application::services::UpdateLink;

/// Request body for `PATCH /api/urls/{code}`.
///
/// All fields are optional but at least one must be present.
///
/// # `expires_at` semantics
///
/// - **Absent** (`expires_at` not in JSON) → leave existing value unchanged
/// - **`null`** → clear expiry (link never expires)
/// - **Timestamp** → set new expiry
#[serde_as]
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_not_empty"))]
pub struct UpdateLinkRequest {
    /// New destination URL for this link.
    pub target_url: Option<String>,

    /// Re-activate or deactivate the link.
    pub is_active: Option<bool>,

    /// Expiry timestamp. Absent = no change, null = clear, value = set.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

fn validate_not_empty(request: &UpdateLinkRequest) -> Result<(), ValidationError> {
    if request.target_url.is_none() && request.is_active.is_none() && request.expires_at.is_none()
    {
        let mut error = ValidationError::new("empty_update");
        error.message = Some("At least one field must be provided".into());
        return Err(error);
    }
    Ok(())
}

impl From<UpdateLinkRequest> for UpdateLink {
    fn from(request: UpdateLinkRequest) -> Self {
        UpdateLink {
            target_url: request.target_url,
            is_active: request.is_active,
            expires_at: request.expires_at,
        }
    }
}
