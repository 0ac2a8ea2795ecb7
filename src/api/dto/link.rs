//! DTOs for link responses and listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::services::LinkInfo;
use crate::domain::entities::ShortLink;

/// JSON representation of a link.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub short_code: String,
    pub short_url: String,
    pub target_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LinkResponse {
    /// Builds the response, joining `base_url` and the code into `short_url`.
    pub fn from_link(link: ShortLink, base_url: &str) -> Self {
        Self {
            short_url: format!("{}/{}", base_url.trim_end_matches('/'), link.code),
            short_code: link.code,
            target_url: link.target_url,
            is_active: link.is_active,
            created_at: link.created_at,
            expires_at: link.expires_at,
        }
    }
}

/// Link details with click statistics.
#[derive(Debug, Serialize)]
pub struct LinkInfoResponse {
    #[serde(flatten)]
    pub link: LinkResponse,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

impl LinkInfoResponse {
    pub fn from_info(info: LinkInfo, base_url: &str) -> Self {
        Self {
            link: LinkResponse::from_link(info.link, base_url),
            click_count: info.click_count,
            last_clicked_at: info.last_clicked_at,
        }
    }
}

/// Query parameters for `GET /api/urls`.
#[derive(Debug, Default, Deserialize)]
pub struct RecentLinksQuery {
    /// Clamped to `1..=100` by the service; defaults to 10.
    pub limit: Option<i64>,
}

/// Links created in the last 7 days.
#[derive(Debug, Serialize)]
pub struct RecentLinksResponse {
    pub count: usize,
    pub items: Vec<LinkResponse>,
}
