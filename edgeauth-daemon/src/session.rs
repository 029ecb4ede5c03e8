//! Host integration for "real session started" notifications.
//!
//! Once a genuine login is seen from an address, its temporary IP grant is
//! no longer needed and is revoked to shrink the exposure window. How the
//! notification arrives is up to the host; it forwards the session's remote
//! endpoint here.

use std::sync::Arc;

use edgeauth_core::EphemeralAllowStore;
use tokio::sync::mpsc;

/// A session was established from `remote_endpoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStarted {
    /// Remote endpoint as the host reports it, port included or not.
    pub remote_endpoint: String,
}

/// Extract the IP from a remote endpoint.
///
/// Handles:
/// - bracketed IPv6 with port: `[2001:db8::1]:1234`
/// - IPv4 with port: `203.0.113.7:5000`
/// - bare IPv6: `::1`
/// - bare IPv4: `203.0.113.7`
pub fn extract_ip(remote_endpoint: &str) -> Option<&str> {
    let endpoint = remote_endpoint.trim();

    let ip = if let Some(rest) = endpoint.strip_prefix('[') {
        &rest[..rest.find(']')?]
    } else if endpoint.matches(':').count() == 1 {
        // Exactly one colon can only be ip:port
        endpoint.split(':').next()?
    } else {
        endpoint
    };

    Some(ip).filter(|ip| !ip.is_empty())
}

/// Revokes temporary grants when real sessions start.
#[derive(Debug, Clone)]
pub struct SessionObserver {
    store: Arc<EphemeralAllowStore>,
}

impl SessionObserver {
    pub fn new(store: Arc<EphemeralAllowStore>) -> Self {
        Self { store }
    }

    /// Handle one notification. Returns `true` if a grant was revoked.
    pub fn on_session_started(&self, remote_endpoint: &str) -> bool {
        let Some(ip) = extract_ip(remote_endpoint) else {
            tracing::debug!("Session started without a usable remote endpoint");
            return false;
        };

        let revoked = self.store.revoke_by_ip(ip);
        if revoked {
            tracing::info!("Revoked temporary admission for an IP after session start");
        }
        revoked
    }

    /// Consume notifications until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<SessionStarted>) {
        while let Some(event) = events.recv().await {
            self.on_session_started(&event.remote_endpoint);
        }
        tracing::debug!("Session event channel closed");
    }
}
