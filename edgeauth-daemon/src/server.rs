//! HTTP surface of the gateway.
//!
//! | Route           | Success                         | Failure                         |
//! |-----------------|---------------------------------|---------------------------------|
//! | `GET /validate` | 200 + `X-Auth-Method`           | 401                             |
//! | `POST /allow`   | 200 `{"ok":true}`               | 400 / 401 / 403 / 429 / 500     |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use edgeauth_core::signing::GRANT_PATH;
use edgeauth_core::{
    AdminVerifier, AdmissionGate, CheckRequest, Decision, EphemeralAllowStore, FailureClass,
    GrantError, SecretProvider, TokenValidator,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::DaemonConfig;
use crate::services::{limit_grants, GrantRateLimiter};
use crate::session::SessionObserver;

/// Loopback only; the colocated reverse proxy is the sole caller.
pub const LISTEN_ADDR: &str = "127.0.0.1:5577";

/// Check route.
pub const VALIDATE_PATH: &str = "/validate";

/// Response header naming the admission path that let a request through.
pub const AUTH_METHOD_HEADER: &str = "x-auth-method";

/// Shared state behind the routes.
#[derive(Clone)]
struct AppState {
    gate: AdmissionGate,
    verifier: AdminVerifier,
    secrets: Arc<dyn SecretProvider>,
}

/// The assembled gateway: one allow store shared by check, grant and
/// session-revocation paths.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<EphemeralAllowStore>,
    state: AppState,
    limiter: GrantRateLimiter,
}

impl Gateway {
    /// Assemble the gateway from configuration and its collaborators.
    pub fn new(
        config: &DaemonConfig,
        validator: Arc<dyn TokenValidator>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        let store = Arc::new(EphemeralAllowStore::new());

        let mut gate = AdmissionGate::new(validator, store.clone());
        if config.strict_login_only {
            tracing::info!("Strict login mode: temporary IP grants will not admit");
            gate = gate.token_only();
        }

        let verifier = AdminVerifier::new(config.grant_policy(), store.clone());

        Self {
            store,
            state: AppState {
                gate,
                verifier,
                secrets,
            },
            limiter: GrantRateLimiter::new(config.grant_rate_per_second, config.grant_burst),
        }
    }

    /// The allow store shared by every path.
    pub fn store(&self) -> &Arc<EphemeralAllowStore> {
        &self.store
    }

    /// Observer for the host's "session started" notifications.
    pub fn session_observer(&self) -> SessionObserver {
        SessionObserver::new(self.store.clone())
    }

    /// Routes for the gateway.
    pub fn router(&self) -> Router {
        let grants = Router::new()
            .route(GRANT_PATH, post(allow))
            .route_layer(middleware::from_fn_with_state(
                self.limiter.clone(),
                limit_grants,
            ));

        Router::new()
            .route(VALIDATE_PATH, get(validate))
            .merge(grants)
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until SIGINT or SIGTERM.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn validate(State(state): State<AppState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let check = CheckRequest::from_headers(request.headers(), peer);

    match state.gate.decide(&check).await {
        Decision::Admit(method) => {
            tracing::debug!(method = %method, "Request admitted");
            (StatusCode::OK, [(AUTH_METHOD_HEADER, method.as_str())]).into_response()
        }
        Decision::Deny => {
            tracing::debug!("Request denied");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

async fn allow(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Resolved per request so a rotated secret applies immediately. The
    // provider may read the config file, so keep it off the runtime threads.
    let secret = match tokio::task::spawn_blocking({
        let secrets = state.secrets.clone();
        move || secrets.admin_secret()
    })
    .await
    {
        Ok(secret) => secret,
        Err(e) => {
            tracing::error!(error = %e, "Admin secret lookup failed");
            None
        }
    };

    match state
        .verifier
        .verify_and_apply(secret.as_ref(), &headers, &body, unix_now())
    {
        Ok(grant) => {
            tracing::info!(ttl_secs = grant.ttl.as_secs(), "Granted temporary admission for an IP");
            Json(json!({ "ok": true })).into_response()
        }
        Err(e) => grant_rejection(&e),
    }
}

fn grant_rejection(error: &GrantError) -> Response {
    match error.class() {
        FailureClass::Misconfigured => {
            tracing::error!("Grant refused: admin secret not set");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "admin secret not set" })),
            )
                .into_response()
        }
        FailureClass::BadRequest => {
            tracing::debug!(reason = %error, "Grant rejected: bad request");
            StatusCode::BAD_REQUEST.into_response()
        }
        FailureClass::Stale => {
            tracing::warn!(reason = %error, "Grant rejected: stale or early timestamp");
            StatusCode::UNAUTHORIZED.into_response()
        }
        FailureClass::Forbidden => {
            tracing::warn!("Grant rejected: signature mismatch");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
