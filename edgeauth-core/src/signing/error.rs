//! Grant verification error types.

/// Errors that can occur while verifying a grant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GrantError {
    /// Neither the override nor the persisted secret is set.
    #[error("admin secret not set")]
    SecretUnavailable,

    /// The timestamp or signature header is absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp is not an integer.
    #[error("malformed timestamp")]
    MalformedTimestamp,

    /// The body is not a grant document.
    #[error("malformed body")]
    MalformedBody,

    /// The timestamp is too old.
    #[error("timestamp expired")]
    TimestampExpired,

    /// The timestamp is too far in the future.
    #[error("timestamp in future")]
    TimestampInFuture,

    /// The signature does not match.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Coarse failure classes, one outward status each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Operator-side problem, not a security rejection.
    Misconfigured,
    /// Caller sent something malformed.
    BadRequest,
    /// Timestamp outside the skew window.
    Stale,
    /// Signature mismatch.
    Forbidden,
}

impl GrantError {
    /// The failure class this error is reported as.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::SecretUnavailable => FailureClass::Misconfigured,
            Self::MissingHeader(_) | Self::MalformedTimestamp | Self::MalformedBody => {
                FailureClass::BadRequest
            }
            Self::TimestampExpired | Self::TimestampInFuture => FailureClass::Stale,
            Self::InvalidSignature => FailureClass::Forbidden,
        }
    }
}
