//! Shared application state injected into every handler.

use std::sync::Arc;

use crate::application::services::LinkService;
use crate::domain::repositories::{ClickRepository, LinkRepository};

/// Link service over type-erased store handles.
pub type SharedLinkService = LinkService<dyn LinkRepository, dyn ClickRepository>;

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<SharedLinkService>,
    /// Public origin used to build `short_url`, without a trailing slash.
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(link_service: Arc<SharedLinkService>, base_url: &str) -> Self {
        Self {
            link_service,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }
}
