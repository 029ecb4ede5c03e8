//! Daemon configuration.
//!
//! Settings come from a persisted JSON file, with a few environment
//! overrides:
//! - `EDGEAUTH_ADMIN_SECRET` - admin secret, takes precedence over `adminSecret`
//! - `EDGEAUTH_JF_BASEURL`, then `JELLYFIN_PublishedServerUrl` - session
//!   authority base URL, takes precedence over `sessionAuthorityUrl`

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgeauth_core::{AdminSecret, GrantPolicy, SecretProvider};
use serde::{Deserialize, Serialize};

/// Environment override for the admin secret.
pub const ADMIN_SECRET_ENV: &str = "EDGEAUTH_ADMIN_SECRET";

/// Environment overrides for the session authority URL, first set wins.
pub const AUTHORITY_URL_ENVS: [&str; 2] = ["EDGEAUTH_JF_BASEURL", "JELLYFIN_PublishedServerUrl"];

/// Errors loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Persisted daemon settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Fallback admin secret. Blank by default; prefer the environment.
    pub admin_secret: String,
    /// TTL for grants that ask for none.
    pub default_ttl_seconds: i64,
    /// Tolerated clock skew on grant timestamps.
    pub admin_hmac_skew_seconds: i64,
    /// Admit by token only; ignore temporary IP grants.
    pub strict_login_only: bool,
    /// Base URL of the host answering `/Users/Me`.
    pub session_authority_url: Option<String>,
    /// Bound on a single token check against the session authority.
    pub token_check_timeout_ms: u64,
    /// Sustained grant requests per second.
    pub grant_rate_per_second: u32,
    /// Grant burst size.
    pub grant_burst: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let policy = GrantPolicy::default();
        Self {
            admin_secret: String::new(),
            default_ttl_seconds: policy.default_ttl_seconds,
            admin_hmac_skew_seconds: policy.skew_seconds,
            strict_login_only: false,
            session_authority_url: None,
            token_check_timeout_ms: 5_000,
            grant_rate_per_second: 5,
            grant_burst: 20,
        }
    }
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .field("admin_hmac_skew_seconds", &self.admin_hmac_skew_seconds)
            .field("strict_login_only", &self.strict_login_only)
            .field("session_authority_url", &self.session_authority_url)
            .field("token_check_timeout_ms", &self.token_check_timeout_ms)
            .field("grant_rate_per_second", &self.grant_rate_per_second)
            .field("grant_burst", &self.grant_burst)
            .finish_non_exhaustive()
    }
}

impl DaemonConfig {
    /// `<config dir>/edgeauth/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("edgeauth")
            .join("config.json")
    }

    /// Load the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Grant limits derived from this config.
    pub fn grant_policy(&self) -> GrantPolicy {
        GrantPolicy {
            skew_seconds: self.admin_hmac_skew_seconds,
            default_ttl_seconds: self.default_ttl_seconds,
        }
    }

    pub fn token_check_timeout(&self) -> Duration {
        Duration::from_millis(self.token_check_timeout_ms)
    }

    /// Session authority URL, environment first, then this file.
    pub fn session_authority_url(&self) -> Option<String> {
        self.session_authority_url_with(|name| std::env::var(name).ok())
    }

    fn session_authority_url_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        AUTHORITY_URL_ENVS
            .iter()
            .find_map(|name| env(name))
            .or_else(|| self.session_authority_url.clone())
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
    }
}

/// Admin secret from the environment, falling back to the config file.
///
/// Both sources are read again on every call, so rotating the secret does
/// not need a restart.
///
/// Reading the file blocks; call [`SecretProvider::admin_secret`] from a
/// blocking context (the server uses `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct EnvConfigSecret {
    env_var: String,
    config_path: PathBuf,
    /// Set while the file is unreadable, so the warning fires once per outage
    read_failing: Arc<AtomicBool>,
}

impl EnvConfigSecret {
    /// Read `EDGEAUTH_ADMIN_SECRET`, then `adminSecret` in `config_path`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self::with_env_var(ADMIN_SECRET_ENV, config_path)
    }

    /// Same, with a different override variable.
    pub fn with_env_var(env_var: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            config_path: config_path.into(),
            read_failing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn persisted(&self) -> Option<String> {
        match DaemonConfig::load(&self.config_path) {
            Ok(config) => {
                if self.read_failing.swap(false, Ordering::Relaxed) {
                    tracing::info!("Persisted admin secret readable again");
                }
                Some(config.admin_secret)
            }
            Err(e) => {
                if self.read_failing.swap(true, Ordering::Relaxed) {
                    tracing::debug!(error = %e, "Persisted admin secret still unreadable");
                } else {
                    tracing::warn!(error = %e, "Could not read persisted admin secret");
                }
                None
            }
        }
    }
}

impl SecretProvider for EnvConfigSecret {
    fn admin_secret(&self) -> Option<AdminSecret> {
        // The file is only touched when the override is unset or blank
        let env = std::iter::once(std::env::var(&self.env_var).ok());
        AdminSecret::first_available(env.chain(std::iter::once_with(|| self.persisted())))
    }
}
