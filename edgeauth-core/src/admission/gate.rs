//! The admission algorithm.

use std::fmt;
use std::sync::Arc;

use super::credentials::CheckRequest;
use super::validator::TokenValidator;
use crate::allow::EphemeralAllowStore;

/// Which path admitted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionMethod {
    /// A validated token.
    Token,
    /// A live ephemeral grant for the client IP.
    IpTemp,
}

impl AdmissionMethod {
    /// Wire name, surfaced to the proxy for auditing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::IpTemp => "ip-temp",
        }
    }
}

impl fmt::Display for AdmissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    Admit(AdmissionMethod),
    /// Turn the request away.
    Deny,
}

impl Decision {
    /// Whether the request is admitted.
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit(_))
    }
}

/// Decides admit/deny for check requests.
#[derive(Clone)]
pub struct AdmissionGate {
    validator: Arc<dyn TokenValidator>,
    store: Arc<EphemeralAllowStore>,
    ip_fallback: bool,
}

impl AdmissionGate {
    /// Create a gate over a token validator and the shared allow store.
    pub fn new(validator: Arc<dyn TokenValidator>, store: Arc<EphemeralAllowStore>) -> Self {
        Self {
            validator,
            store,
            ip_fallback: true,
        }
    }

    /// Only admit by token; ephemeral IP grants are ignored.
    #[must_use]
    pub fn token_only(mut self) -> Self {
        self.ip_fallback = false;
        self
    }

    /// Decide a check request.
    ///
    /// Order, first match wins:
    /// 1. non-empty token the validator confirms -> [`AdmissionMethod::Token`]
    /// 2. live grant for the client IP -> [`AdmissionMethod::IpTemp`]
    /// 3. deny
    ///
    /// A validator error counts as an invalid token and never escapes.
    pub async fn decide(&self, request: &CheckRequest) -> Decision {
        if self.token_is_valid(&request.token).await {
            return Decision::Admit(AdmissionMethod::Token);
        }

        if self.ip_fallback && self.store.exists(&request.client_ip) {
            return Decision::Admit(AdmissionMethod::IpTemp);
        }

        Decision::Deny
    }

    /// The allow store this gate consults.
    pub fn store(&self) -> &Arc<EphemeralAllowStore> {
        &self.store
    }

    async fn token_is_valid(&self, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        matches!(self.validator.check(token).await, Ok(true))
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("ip_fallback", &self.ip_fallback)
            .finish_non_exhaustive()
    }
}
