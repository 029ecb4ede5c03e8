//! Canonical string and signature for grants.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::secret::AdminSecret;

/// Request method bound into every grant signature.
pub const GRANT_METHOD: &str = "POST";

/// Request path bound into every grant signature.
pub const GRANT_PATH: &str = "/allow";

type HmacSha256 = Hmac<Sha256>;

/// Build the string that gets signed.
///
/// Newline-joined, in this exact order:
///
/// ```text
/// POST
/// /allow
/// <timestamp>
/// <ip>
/// <ttl seconds>
/// ```
pub fn canonical_string(timestamp: i64, ip: &str, ttl_seconds: i64) -> String {
    format!("{GRANT_METHOD}\n{GRANT_PATH}\n{timestamp}\n{ip}\n{ttl_seconds}")
}

/// Lowercase hex HMAC-SHA256 of `canonical` under `secret`.
pub fn sign(secret: &AdminSecret, canonical: &str) -> String {
    hex::encode(mac_bytes(secret, canonical))
}

pub(crate) fn mac_bytes(secret: &AdminSecret, canonical: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
