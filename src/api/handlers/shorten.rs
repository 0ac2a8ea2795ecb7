//! Handler for link shortening endpoint.

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::api::dto::link::LinkResponse;
use crate::api::dto::shorten::ShortenRequest;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/path",
///   "custom_code": "my-link",              // optional
///   "expires_at": "2030-01-01T00:00:00Z"   // optional
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "short_code": "aZ3kQ9x",
///   "short_url": "http://localhost:3000/aZ3kQ9x",
///   "target_url": "https://example.com/path",
///   "is_active": true,
///   "created_at": "2025-01-01T00:00:00Z",
///   "expires_at": null
/// }
/// ```
///
/// # Errors
///
/// - 400 for an invalid URL, custom code or expiry
/// - 409 if the custom code is reserved or taken
/// - 503 if no free code was found within the retry budget
pub async fn shorten_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    payload.validate()?;

    let link = state.link_service.create_short_link(payload.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(LinkResponse::from_link(link, &state.base_url)),
    ))
}
