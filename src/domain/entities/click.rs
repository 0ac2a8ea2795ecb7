//! Click fact: one immutable record of a resolved redirect.

use chrono::{DateTime, Utc};

/// UTM campaign attributes captured from the redirect query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl UtmParams {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.medium.is_none()
            && self.campaign.is_none()
            && self.term.is_none()
            && self.content.is_none()
    }
}

/// A click ready for persistence.
///
/// Built by [`crate::application::services::ClickTracker`] after privacy rules
/// (IP anonymization, truncation) have been applied. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickFact {
    pub link_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm: UtmParams,
    /// Non-UTM query parameters as a JSON object string.
    pub query_params: Option<String>,
}

impl ClickFact {
    /// A fact carrying only the link and timestamp.
    pub fn bare(link_id: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            link_id,
            occurred_at,
            ip: None,
            user_agent: None,
            referrer: None,
            utm: UtmParams::default(),
            query_params: None,
        }
    }
}
