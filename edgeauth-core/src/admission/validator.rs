//! Token validation capability.
//!
//! The gate only needs to know whether a token names a live, authenticated
//! principal. How that is answered depends on the host: an in-process session
//! registry ([`RegistryValidator`]) or a call out to the host's "who am I"
//! endpoint (implemented by the daemon).

use async_trait::async_trait;

/// Reasons a token could not be validated.
///
/// None of these reach the caller of a check: the gate treats every one of
/// them as "token invalid".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// No session authority is configured.
    #[error("session authority not configured")]
    Unconfigured,

    /// The session authority did not answer in time.
    #[error("session authority timed out")]
    Timeout,

    /// The session authority could not be reached.
    #[error("session authority unreachable")]
    Transport,

    /// The session authority answered with something unusable.
    #[error("malformed response from session authority")]
    MalformedResponse,
}

/// Trait for checking whether a token identifies a live principal.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; checks run concurrently, one per
/// inbound request, and must not block one another.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Returns `Ok(true)` if `token` belongs to a live, authenticated
    /// principal and `Ok(false)` if it is known not to.
    async fn check(&self, token: &str) -> Result<bool, ValidationError>;
}

/// In-process view of the host's live sessions.
pub trait SessionRegistry: Send + Sync {
    /// Whether `token` is bound to a live session.
    fn is_live(&self, token: &str) -> Result<bool, ValidationError>;
}

/// [`TokenValidator`] backed by a direct query against a [`SessionRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryValidator<R> {
    registry: R,
}

impl<R: SessionRegistry> RegistryValidator<R> {
    /// Wrap a session registry.
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<R: SessionRegistry> TokenValidator for RegistryValidator<R> {
    async fn check(&self, token: &str) -> Result<bool, ValidationError> {
        self.registry.is_live(token)
    }
}
