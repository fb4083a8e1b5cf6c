//! Slack request signing: `v0=` + HMAC-SHA256(secret, "v0:{timestamp}:{body}").
//!
//! See <https://api.slack.com/authentication/verifying-requests-from-slack>.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Requests whose timestamp differs from the local clock by more than this are rejected.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

const VERSION: &str = "v0";

/// Compute the `v0=<hex>` signature for a timestamp and raw body.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes()).ok()?;
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(format!(
        "{}={}",
        VERSION,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a request against the current clock. Fails closed on any missing or malformed input.
pub fn verify_request(
    signing_secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> bool {
    verify_request_at(
        signing_secret,
        timestamp,
        signature,
        body,
        chrono::Utc::now().timestamp(),
    )
}

/// Same as [`verify_request`] with an explicit "now" (unix seconds).
pub fn verify_request_at(
    signing_secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> bool {
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        log::warn!("slack signature: missing timestamp or signature header");
        return false;
    };
    let Ok(sent_at) = timestamp.trim().parse::<i64>() else {
        log::warn!("slack signature: malformed timestamp header");
        return false;
    };
    if now.abs_diff(sent_at) > MAX_CLOCK_SKEW_SECS.unsigned_abs() {
        log::warn!("slack signature: timestamp outside the {}s window", MAX_CLOCK_SKEW_SECS);
        return false;
    }
    let Some(expected) = sign(signing_secret, timestamp, body) else {
        log::warn!("slack signature: could not initialise hmac");
        return false;
    };
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

/// Compare without early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
