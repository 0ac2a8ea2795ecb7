//! Turns redirect metadata into click facts and queues them.

use std::net::IpAddr;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::config::ShortenerSettings;
use crate::domain::click_context::ClickContext;
use crate::domain::entities::{ClickFact, ShortLink, UtmParams};

const MAX_HEADER_LENGTH: usize = 500;
const MAX_QUERY_KEY_LENGTH: usize = 100;
const MAX_QUERY_VALUE_LENGTH: usize = 500;
const MAX_QUERY_JSON_LENGTH: usize = 1000;

/// Privacy switches applied to every click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickPolicy {
    pub enabled: bool,
    pub anonymize_ips: bool,
    pub respect_do_not_track: bool,
}

impl From<&ShortenerSettings> for ClickPolicy {
    fn from(settings: &ShortenerSettings) -> Self {
        Self {
            enabled: settings.enable_analytics,
            anonymize_ips: settings.anonymize_ips,
            respect_do_not_track: settings.respect_do_not_track,
        }
    }
}

/// What happened to a click handed to [`ClickTracker::track`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Queued,
    Disabled,
    OptedOut,
    /// Queue full or closed; the fact was discarded.
    Dropped,
}

/// Non-blocking producer side of the click queue.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    sender: mpsc::Sender<ClickFact>,
    policy: ClickPolicy,
}

impl ClickTracker {
    pub fn new(sender: mpsc::Sender<ClickFact>, policy: ClickPolicy) -> Self {
        Self { sender, policy }
    }

    /// Builds a fact for `link` and queues it without waiting.
    ///
    /// Never fails the caller. A full queue drops the click.
    pub fn track(&self, link: &ShortLink, context: ClickContext) -> TrackOutcome {
        if !self.policy.enabled {
            return TrackOutcome::Disabled;
        }

        if self.policy.respect_do_not_track && context.do_not_track {
            debug!(code = %link.code, "Click skipped, client opted out of tracking");
            return TrackOutcome::OptedOut;
        }

        let fact = self.build_fact(link.id, context);

        match self.sender.try_send(fact) {
            Ok(()) => TrackOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                metrics::counter!("shortcode_clicks_dropped_total").increment(1);
                warn!(code = %link.code, "Click queue full, dropping click");
                TrackOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                metrics::counter!("shortcode_clicks_dropped_total").increment(1);
                error!(code = %link.code, "Click queue closed, dropping click");
                TrackOutcome::Dropped
            }
        }
    }

    /// Applies the privacy policy to `context`.
    pub fn build_fact(&self, link_id: i64, context: ClickContext) -> ClickFact {
        let ip = context.ip.map(|ip| {
            if self.policy.anonymize_ips {
                anonymize_ip(ip)
            } else {
                ip
            }
        });

        ClickFact {
            link_id,
            occurred_at: context.received_at,
            ip: ip.map(|ip| ip.to_string()),
            user_agent: non_empty(context.user_agent).map(|ua| truncate(&ua, MAX_HEADER_LENGTH)),
            referrer: non_empty(context.referrer).map(|r| truncate(&r, MAX_HEADER_LENGTH)),
            utm: utm_params(&context.query),
            query_params: encode_query_params(&context.query),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn policy(&self) -> ClickPolicy {
        self.policy
    }
}

/// Zeroes host bits: IPv4 keeps its /24, IPv6 its /48.
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::from([a, b, c, 0])
        }
        IpAddr::V6(v6) => {
            let mut segments = v6.segments();
            segments[3..].fill(0);
            IpAddr::from(segments)
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// First value wins when a key repeats.
fn first_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn utm_params(query: &[(String, String)]) -> UtmParams {
    let get = |key: &str| first_value(query, key).map(|v| truncate(v, MAX_HEADER_LENGTH));

    UtmParams {
        source: get("utm_source"),
        medium: get("utm_medium"),
        campaign: get("utm_campaign"),
        term: get("utm_term"),
        content: get("utm_content"),
    }
}

/// Serializes query parameters as a JSON object no longer than 1000 chars.
fn encode_query_params(query: &[(String, String)]) -> Option<String> {
    let mut params = Map::new();
    let mut encoded_len = 2;

    for (key, value) in query {
        let key = truncate(key, MAX_QUERY_KEY_LENGTH);
        if params.contains_key(&key) {
            continue;
        }
        let value = Value::String(truncate(value, MAX_QUERY_VALUE_LENGTH));

        let entry_len = serde_json::to_string(&key).map_or(0, |k| k.len())
            + serde_json::to_string(&value).map_or(0, |v| v.len())
            + 1
            + usize::from(!params.is_empty());

        if encoded_len + entry_len > MAX_QUERY_JSON_LENGTH {
            continue;
        }

        encoded_len += entry_len;
        params.insert(key, value);
    }

    if params.is_empty() {
        return None;
    }

    serde_json::to_string(&Value::Object(params)).ok()
}
