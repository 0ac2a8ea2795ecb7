//! Request metadata captured at redirect time.

use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Raw client metadata for one redirect.
///
/// Built by the redirect handler and turned into a
/// [`ClickFact`](crate::domain::entities::ClickFact) once privacy rules have been
/// applied. Every field is optional so missing headers are not an error.
#[derive(Debug, Clone)]
pub struct ClickContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub query: Vec<(String, String)>,
    /// Client sent `DNT: 1` or `Sec-GPC: 1`.
    pub do_not_track: bool,
    pub received_at: DateTime<Utc>,
}

impl ClickContext {
    /// Creates a new click context.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let ctx = ClickContext::new(
    ///     Some("203.0.113.7".parse().unwrap()),
    ///     Some("Mozilla/5.0"),
    ///     Some("https://google.com"),
    ///     vec![("utm_source".into(), "newsletter".into())],
    ///     false,
    /// );
    /// ```
    pub fn new(
        ip: Option<IpAddr>,
        user_agent: Option<&str>,
        referrer: Option<&str>,
        query: Vec<(String, String)>,
        do_not_track: bool,
    ) -> Self {
        Self {
            ip,
            user_agent: user_agent.map(str::to_string),
            referrer: referrer.map(str::to_string),
            query,
            do_not_track,
            received_at: Utc::now(),
        }
    }

    /// A context with no client metadata.
    pub fn anonymous() -> Self {
        Self::new(None, None, None, Vec::new(), false)
    }
}
