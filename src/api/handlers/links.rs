//! Handlers for link management endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::link::{
    LinkInfoResponse, LinkResponse, RecentLinksQuery, RecentLinksResponse,
};
use crate::api::dto::update_link::UpdateLinkRequest;
use crate::error::AppError;
use crate::state::AppState;

/// Returns a link with its click count.
///
/// # Endpoint
///
/// `GET /api/urls/{code}`
///
/// Inactive and expired links are returned as well; only the redirect
/// refuses them.
///
/// # Errors
///
/// Returns 404 Not Found if the code does not exist.
pub async fn link_info_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LinkInfoResponse>, AppError> {
    let info = state.link_service.get_link_info(&code).await?;

    Ok(Json(LinkInfoResponse::from_info(info, &state.base_url)))
}

/// Partially updates a short link.
///
/// # Endpoint
///
/// `PATCH /api/urls/{code}`
///
/// # Request Body
///
/// All fields are optional. Only provided fields are changed.
///
/// ```json
/// {
///   "target_url": "https://new-destination.com",
///   "is_active": true,
///   "expires_at": "2030-12-31T23:59:59Z"  // null to clear
/// }
/// ```
///
/// # Errors
///
/// Returns 404 Not Found if the link doesn't exist.
/// Returns 400 Bad Request if validation fails.
pub async fn update_link_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    payload.validate()?;

    let link = state.link_service.update_link(&code, payload.into()).await?;

    Ok(Json(LinkResponse::from_link(link, &state.base_url)))
}

/// Deactivates a short link.
///
/// # Endpoint
///
/// `DELETE /api/urls/{code}`
///
/// # Behavior
///
/// - The record stays in the store and the code stays taken.
/// - Subsequent redirects return **403 Forbidden**.
/// - `PATCH` with `{"is_active": true}` re-activates it.
///
/// # Errors
///
/// Returns 404 Not Found if the link doesn't exist.
pub async fn delete_link_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.link_service.deactivate_link(&code).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Lists links created in the last 7 days, newest first.
///
/// # Endpoint
///
/// `GET /api/urls?limit=20`
pub async fn recent_links_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentLinksQuery>,
) -> Result<Json<RecentLinksResponse>, AppError> {
    let links = state.link_service.recent_links(query.limit).await?;

    let items: Vec<_> = links
        .into_iter()
        .map(|link| LinkResponse::from_link(link, &state.base_url))
        .collect();

    Ok(Json(RecentLinksResponse {
        count: items.len(),
        items,
    }))
}
