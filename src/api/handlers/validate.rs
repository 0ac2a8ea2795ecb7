//! Handler for custom code availability checks.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::validate::ValidateCodeResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Reports whether a custom code could be claimed right now.
///
/// # Endpoint
///
/// `GET /api/validate/{code}`
///
/// # Response
///
/// ```json
/// { "code": "admin", "available": false, "reason": "Code 'admin' is reserved" }
/// ```
///
/// An unusable code is a `200` with `available: false`, not an error.
pub async fn validate_code_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ValidateCodeResponse>, AppError> {
    let availability = state.link_service.check_custom_code(&code).await?;

    Ok(Json(availability.into()))
}
