//! Grant verification.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::canonical::{canonical_string, mac_bytes};
use super::error::GrantError;
use super::secret::AdminSecret;
use crate::allow::EphemeralAllowStore;

/// Unix timestamp (seconds) the grant claims to have been signed at.
pub const TIMESTAMP_HEADER: &str = "x-admin-timestamp";

/// Hex HMAC-SHA256 over the canonical string.
pub const SIGNATURE_HEADER: &str = "x-admin-signature";

/// Default skew tolerance in seconds.
const DEFAULT_SKEW_SECONDS: i64 = 60;

/// Default grant lifetime in seconds.
const DEFAULT_TTL_SECONDS: i64 = 300;

/// TTL a body without `ttlSeconds` carries, both when signed and when applied.
/// Independent of [`GrantPolicy::default_ttl_seconds`].
pub const ABSENT_TTL_SECONDS: i64 = 300;

/// Limits applied to grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    /// Maximum `|now - timestamp|`, floored at one second.
    pub skew_seconds: i64,
    /// TTL used when a grant asks for zero or a negative value.
    pub default_ttl_seconds: i64,
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            skew_seconds: DEFAULT_SKEW_SECONDS,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl GrantPolicy {
    /// Skew actually enforced. Never below one second, whatever the config says.
    pub fn effective_skew(&self) -> u64 {
        self.skew_seconds.max(1).unsigned_abs()
    }

    /// Lifetime for a grant that asked for `requested` seconds.
    pub fn effective_ttl(&self, requested: i64) -> Duration {
        let secs = if requested > 0 {
            requested
        } else {
            self.default_ttl_seconds
        };
        Duration::from_secs(u64::try_from(secs).unwrap_or(0))
    }
}

/// Grant request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GrantBody {
    /// IP to admit.
    #[serde(default, alias = "Ip")]
    pub ip: Option<String>,
    /// Requested lifetime in seconds; [`ABSENT_TTL_SECONDS`] when absent.
    #[serde(default, rename = "ttlSeconds", alias = "TtlSeconds")]
    pub ttl_seconds: Option<i64>,
}

impl GrantBody {
    /// Parse a JSON body. An empty body means both fields are absent.
    pub fn from_json(bytes: &[u8]) -> Result<Self, GrantError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|_| GrantError::MalformedBody)
    }

    fn ip(&self) -> &str {
        self.ip.as_deref().unwrap_or_default()
    }

    fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds.unwrap_or(ABSENT_TTL_SECONDS)
    }
}

/// A grant that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedGrant {
    /// IP exactly as signed.
    pub ip: String,
    /// Lifetime after applying the default.
    pub ttl: Duration,
}

/// Verifies signed grants and applies them to the allow store.
#[derive(Debug, Clone)]
pub struct AdminVerifier {
    policy: GrantPolicy,
    store: Arc<EphemeralAllowStore>,
}

impl AdminVerifier {
    /// Create a verifier writing into `store`.
    pub fn new(policy: GrantPolicy, store: Arc<EphemeralAllowStore>) -> Self {
        Self { policy, store }
    }

    /// The policy in force.
    pub fn policy(&self) -> &GrantPolicy {
        &self.policy
    }

    /// Verify a grant without applying it.
    ///
    /// Checks run in this order, the first failure is returned:
    /// 1. secret available
    /// 2. timestamp and signature headers present
    /// 3. timestamp is an integer, body is a grant document
    /// 4. timestamp within the skew window (inclusive)
    /// 5. signature matches, compared in constant time
    ///
    /// # Errors
    ///
    /// See [`GrantError`]; [`GrantError::class`] gives the outward signal.
    pub fn verify(
        &self,
        secret: Option<&AdminSecret>,
        headers: &HeaderMap,
        body: &[u8],
        now_utc_seconds: i64,
    ) -> Result<VerifiedGrant, GrantError> {
        let secret = secret.ok_or(GrantError::SecretUnavailable)?;

        let timestamp = headers
            .get(TIMESTAMP_HEADER)
            .ok_or(GrantError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or(GrantError::MissingHeader(SIGNATURE_HEADER))?;

        let timestamp: i64 = timestamp
            .to_str()
            .ok()
            .and_then(|ts| ts.trim().parse().ok())
            .ok_or(GrantError::MalformedTimestamp)?;

        let body = GrantBody::from_json(body)?;

        self.check_freshness(timestamp, now_utc_seconds)?;

        let canonical = canonical_string(timestamp, body.ip(), body.ttl_seconds());
        let expected = mac_bytes(secret, &canonical);
        let provided = signature
            .to_str()
            .ok()
            .and_then(|sig| hex::decode(sig.trim()).ok())
            .ok_or(GrantError::InvalidSignature)?;

        // Slice ct_eq is false on length mismatch without short-circuiting on content
        if !bool::from(expected.ct_eq(&provided)) {
            return Err(GrantError::InvalidSignature);
        }

        Ok(VerifiedGrant {
            ip: body.ip().to_string(),
            ttl: self.policy.effective_ttl(body.ttl_seconds()),
        })
    }

    /// Verify a grant and, on success, admit its IP.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify); the store is untouched on error.
    pub fn verify_and_apply(
        &self,
        secret: Option<&AdminSecret>,
        headers: &HeaderMap,
        body: &[u8],
        now_utc_seconds: i64,
    ) -> Result<VerifiedGrant, GrantError> {
        let grant = self.verify(secret, headers, body, now_utc_seconds)?;
        self.store.add(&grant.ip, grant.ttl);
        Ok(grant)
    }

    fn check_freshness(&self, timestamp: i64, now: i64) -> Result<(), GrantError> {
        let skew = self.policy.effective_skew();
        if now.abs_diff(timestamp) <= skew {
            return Ok(());
        }
        if timestamp < now {
            Err(GrantError::TimestampExpired)
        } else {
            Err(GrantError::TimestampInFuture)
        }
    }
}
