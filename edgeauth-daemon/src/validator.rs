//! Token validation against the host's session authority.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgeauth_core::admission::{LEGACY_TOKEN_HEADER, PRIMARY_TOKEN_HEADER};
use edgeauth_core::{TokenValidator, ValidationError};
use reqwest::header::AUTHORIZATION;

use crate::config::DaemonConfig;

/// Path on the session authority that answers 2xx only for a valid token.
const WHO_AM_I_PATH: &str = "/Users/Me";

/// Checks tokens with a bounded `GET /Users/Me` against the host.
///
/// Any non-2xx answer means "not valid". Transport failures, timeouts and a
/// 2xx with a truncated body are reported as errors, which the gate also
/// treats as "not valid".
#[derive(Debug, Clone)]
pub struct HttpTokenValidator {
    client: reqwest::Client,
    who_am_i: String,
}

impl HttpTokenValidator {
    /// Create a validator for the authority at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            who_am_i: format!("{}{WHO_AM_I_PATH}", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn check(&self, token: &str) -> Result<bool, ValidationError> {
        // Any one of these is enough for the host; send all three
        let authorization = format!(
            "MediaBrowser Client=\"EdgeAuth\", Device=\"EdgeAuth\", DeviceId=\"EdgeAuth\", Version=\"{}\", Token=\"{token}\"",
            env!("CARGO_PKG_VERSION")
        );

        let response = self
            .client
            .get(&self.who_am_i)
            .header(PRIMARY_TOKEN_HEADER, token)
            .header(LEGACY_TOKEN_HEADER, token)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!("Session authority timed out");
                    ValidationError::Timeout
                } else {
                    tracing::warn!("Session authority unreachable");
                    ValidationError::Transport
                }
            })?;

        if !response.status().is_success() {
            return Ok(false);
        }

        // A 2xx whose body never fully arrives is not a confirmation
        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!("Session authority timed out");
                ValidationError::Timeout
            } else {
                tracing::warn!("Session authority sent an unreadable response");
                ValidationError::MalformedResponse
            }
        })?;

        Ok(true)
    }
}

/// Used when no session authority is configured: every token check fails
/// and only temporary IP grants can admit.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredValidator;

#[async_trait]
impl TokenValidator for UnconfiguredValidator {
    async fn check(&self, _token: &str) -> Result<bool, ValidationError> {
        Err(ValidationError::Unconfigured)
    }
}

/// Pick the validator for `config`.
pub fn from_config(config: &DaemonConfig) -> Result<Arc<dyn TokenValidator>, reqwest::Error> {
    match config.session_authority_url() {
        Some(url) => {
            tracing::info!(
                timeout_ms = config.token_check_timeout_ms,
                "Validating tokens against session authority"
            );
            Ok(Arc::new(HttpTokenValidator::new(
                &url,
                config.token_check_timeout(),
            )?))
        }
        None => {
            tracing::warn!(
                "No session authority configured (EDGEAUTH_JF_BASEURL); only temporary IP grants will admit"
            );
            Ok(Arc::new(UnconfiguredValidator))
        }
    }
}
