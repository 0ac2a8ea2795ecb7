//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`      - Short link redirect
//! - `GET  /health`      - Health check: store and click queue
//! - `/api/*`            - REST API
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// Static routes (`/health`, `/api/*`) take precedence over `/{code}`.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::routes::api_routes())
        .route("/{code}", get(redirect_handler))
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
