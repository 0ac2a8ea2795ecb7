//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::debug;

use crate::domain::click_context::ClickContext;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_info::{client_ip, header_str, opted_out_of_tracking};

/// Redirects a short code to its target URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Reject codes that could never have been assigned (400)
/// 2. Look the code up in the store
/// 3. Check active and expiry state
/// 4. Queue a click fact without waiting on it
/// 5. Return 302 Found
///
/// # Click Tracking
///
/// Client IP comes from `X-Forwarded-For`, `X-Real-IP` or the peer address.
/// `DNT: 1` and `Sec-GPC: 1` opt out. A full queue drops the click.
///
/// # Errors
///
/// - 404 Not Found if the code does not exist
/// - 403 Forbidden if the link was deactivated
/// - 410 Gone if the link has expired
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let context = click_context(&request);

    let link = state.link_service.resolve(&code, context).await?;

    debug!(code = %link.code, target_url = %link.target_url, "Redirecting");

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, link.target_url)],
    )
        .into_response())
}

fn click_context(request: &Request) -> ClickContext {
    let headers = request.headers();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let query = request
        .uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    ClickContext::new(
        client_ip(headers, peer),
        header_str(headers, "user-agent"),
        header_str(headers, "referer"),
        query,
        opted_out_of_tracking(headers),
    )
}
