//! Webhook authenticity checks. Every comparison goes through `Mac::verify_slice`,
//! which is constant time.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Seconds a signed Stripe-style timestamp may drift from our clock.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn hmac_sha512_hex(key: &[u8], message: &[u8]) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(key).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_hmac_sha256(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

pub fn verify_hmac_sha512(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Parsed `t=<unix>,v1=<hex>[,v1=<hex>...]` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedSignature {
    pub timestamp: i64,
    pub v1: Vec<String>,
}

impl TimestampedSignature {
    pub fn parse(header: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut v1 = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => v1.push(value.to_string()),
                _ => {}
            }
        }
        match timestamp {
            Some(timestamp) if !v1.is_empty() => Some(Self { timestamp, v1 }),
            _ => None,
        }
    }
}

/// HMAC-SHA256 over `"{t}.{payload}"` against every `v1`, with the timestamp
/// inside `tolerance_secs` of `now_unix`.
pub fn verify_timestamped(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> bool {
    let Some(parsed) = TimestampedSignature::parse(header) else {
        return false;
    };
    if now_unix.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return false;
    }

    let mut signed = format!("{}.", parsed.timestamp).into_bytes();
    signed.extend_from_slice(payload);

    parsed
        .v1
        .iter()
        .any(|candidate| verify_hmac_sha256(secret.as_bytes(), &signed, candidate))
}
