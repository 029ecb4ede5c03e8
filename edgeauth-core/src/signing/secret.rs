//! The administrative secret.

use std::fmt;
use zeroize::Zeroizing;

/// Shared secret keying grant signatures.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone)]
pub struct AdminSecret(Zeroizing<String>);

impl AdminSecret {
    /// Wrap a secret value. Blank values count as "not set".
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = Zeroizing::new(value.into());
        if value.trim().is_empty() {
            return None;
        }
        Some(Self(value))
    }

    /// The first usable secret among `sources`, highest priority first.
    ///
    /// ```
    /// use edgeauth_core::AdminSecret;
    ///
    /// let env = Some(String::new());
    /// let config = Some("from-config".to_string());
    /// assert!(AdminSecret::first_available([env, config]).is_some());
    /// ```
    pub fn first_available<I>(sources: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        sources.into_iter().flatten().find_map(Self::new)
    }

    /// Key material for the MAC.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(<redacted>)")
    }
}

/// Resolves the administrative secret.
///
/// Called once per verification so that a rotated secret takes effect
/// without a restart.
pub trait SecretProvider: Send + Sync {
    /// The current secret, or `None` when none is configured.
    fn admin_secret(&self) -> Option<AdminSecret>;
}

/// A fixed secret, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSecret(Option<AdminSecret>);

impl StaticSecret {
    /// Provide `value` (blank means unset).
    pub fn new(value: &str) -> Self {
        Self(AdminSecret::new(value))
    }

    /// Provide no secret at all.
    pub fn unset() -> Self {
        Self(None)
    }
}

impl SecretProvider for StaticSecret {
    fn admin_secret(&self) -> Option<AdminSecret> {
        self.0.clone()
    }
}
