//! HMAC-signed administrative grants.
//!
//! An operator (usually the reverse proxy) admits an IP for a while by
//! sending a grant signed with a pre-shared secret.
//!
//! # Security
//!
//! - Method and path are part of the signed material, so a signature cannot
//!   be replayed against another endpoint
//! - Freshness is bounded by the skew window only; there is no nonce cache
//!   and a verbatim replay inside the window is accepted
//! - Signatures are compared in constant time

mod canonical;
mod error;
mod secret;
mod verify;

pub use canonical::{canonical_string, sign, GRANT_METHOD, GRANT_PATH};
pub use error::{FailureClass, GrantError};
pub use secret::{AdminSecret, SecretProvider, StaticSecret};
pub use verify::{
    AdminVerifier, GrantBody, GrantPolicy, VerifiedGrant, ABSENT_TTL_SECONDS, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
