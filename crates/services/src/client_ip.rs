//! Best-effort client address for rate limiting.

use std::net::{IpAddr, SocketAddr};

/// Header consulted first; the CDN sets it to `address:port`, with IPv6
/// addresses either bracketed or bare.
pub const VIEWER_ADDRESS_HEADER: &str = "cloudfront-viewer-address";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Resolves the client address from forwarding headers.
///
/// Precedence: viewer-address header, first forwarded-for entry, real-ip
/// header, the raw source address, then `"unknown"`. Never fails.
pub fn client_ip<'a>(header: impl Fn(&str) -> Option<&'a str>, source_ip: Option<&str>) -> String {
    let non_empty = |value: Option<&'a str>| value.map(str::trim).filter(|v| !v.is_empty());

    if let Some(address) = non_empty(header(VIEWER_ADDRESS_HEADER)).and_then(viewer_address) {
        return address;
    }

    if let Some(first) = non_empty(header(FORWARDED_FOR_HEADER))
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = non_empty(header(REAL_IP_HEADER)) {
        return real_ip.to_string();
    }

    source_ip
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Strips the port from a viewer-address value. A bare IPv6 address is
/// kept whole; only a single colon is read as `host:port`.
fn viewer_address(value: &str) -> Option<String> {
    if let Ok(socket) = value.parse::<SocketAddr>() {
        return Some(socket.ip().to_string());
    }
    if let Ok(ip) = value.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Some(ip.to_string());
    }
    let host = match value.split_once(':') {
        Some((host, port)) if !port.contains(':') => host,
        _ => value,
    };
    Some(host.trim_start_matches('[').trim_end_matches(']'))
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}
