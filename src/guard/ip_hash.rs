//! Pseudonymous client identity.
//!
//! Network addresses are never stored. They are reduced to a short 32-bit
//! rolling hash (`h = h * 31 + unit` over UTF-16 code units, wrapping) and
//! rendered in signed base 36. The hash is not collision resistant and is
//! trivially brute-forced over the IPv4 space; it only keeps raw addresses
//! out of the database and the logs.

use std::net::SocketAddr;

use axum::http::HeaderMap;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn hash_ip(ip: &str) -> String {
    let hash = ip
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32));
    to_base36(hash)
}

fn to_base36(value: i32) -> String {
    let mut n = (value as i64).unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Resolve the caller's address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the TCP peer, then `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
