//! Helpers for reading client metadata off redirect requests.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Resolves the client IP.
///
/// Priority:
/// 1. First entry of `X-Forwarded-For`
/// 2. `X-Real-IP`
/// 3. Peer socket address
///
/// Header values that do not parse as an IP address are skipped.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded
        .or_else(|| header_str(headers, "x-real-ip").and_then(|v| v.trim().parse().ok()))
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// True when the client sent `DNT: 1` or `Sec-GPC: 1`.
pub fn opted_out_of_tracking(headers: &HeaderMap) -> bool {
    ["dnt", "sec-gpc"]
        .into_iter()
        .any(|name| header_str(headers, name).is_some_and(|v| v.trim() == "1"))
}

/// Returns a header value if present and valid UTF-8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
