//! API route configuration.

use crate::api::handlers::{
    delete_link_handler, link_info_handler, recent_links_handler, shorten_handler,
    update_link_handler, validate_code_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// All `/api` routes.
///
/// # Endpoints
///
/// - `POST   /shorten`         - Create a short link
/// - `GET    /urls`            - Links created in the last 7 days
/// - `GET    /urls/{code}`     - Link details with click count
/// - `PATCH  /urls/{code}`     - Partially update a link
/// - `DELETE /urls/{code}`     - Deactivate a link
/// - `GET    /validate/{code}` - Custom code availability
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/shorten", post(shorten_handler))
        .route("/urls", get(recent_links_handler))
        .route(
            "/urls/{code}",
            get(link_info_handler)
                .patch(update_link_handler)
                .delete(delete_link_handler),
        )
        .route("/validate/{code}", get(validate_code_handler))
}
