//! Test harness for gateway E2E tests.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot` (no network).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use edgeauth_core::signing::{canonical_string, sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use edgeauth_core::{AdminSecret, SecretProvider, StaticSecret, TokenValidator, ValidationError};
use edgeauth_daemon::{DaemonConfig, Gateway};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const SECRET: &str = "s3cr3t";
pub const LIVE_TOKEN: &str = "live-token";

/// Session authority that knows exactly one live token.
pub struct FakeAuthority;

#[async_trait]
impl TokenValidator for FakeAuthority {
    async fn check(&self, token: &str) -> Result<bool, ValidationError> {
        Ok(token == LIVE_TOKEN)
    }
}

/// Session authority that is always down.
pub struct DownAuthority;

#[async_trait]
impl TokenValidator for DownAuthority {
    async fn check(&self, _token: &str) -> Result<bool, ValidationError> {
        Err(ValidationError::Transport)
    }
}

/// In-process gateway with a known secret.
pub struct TestGateway {
    pub gateway: Gateway,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with(DaemonConfig::default(), Arc::new(FakeAuthority), StaticSecret::new(SECRET))
    }

    pub fn with(
        config: DaemonConfig,
        validator: Arc<dyn TokenValidator>,
        secrets: impl SecretProvider + 'static,
    ) -> Self {
        Self {
            gateway: Gateway::new(&config, validator, Arc::new(secrets)),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.gateway
            .router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// `GET /validate` as the proxy would send it.
    pub async fn check(&self, forwarded_for: Option<&str>, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::get("/validate");
        if let Some(ip) = forwarded_for {
            builder = builder.header("x-forwarded-for", ip);
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Correctly signed grant for `ip`, stamped now.
    pub async fn grant(&self, ip: &str, ttl: i64) -> Response<Body> {
        self.send(signed_grant(SECRET, now(), ip, ttl)).await
    }
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn grant_body(ip: &str, ttl: i64) -> String {
    serde_json::json!({ "ip": ip, "ttlSeconds": ttl }).to_string()
}

/// Grant request signed with `secret` at `timestamp`.
pub fn signed_grant(secret: &str, timestamp: i64, ip: &str, ttl: i64) -> Request<Body> {
    let secret = AdminSecret::new(secret).unwrap();
    let signature = sign(&secret, &canonical_string(timestamp, ip, ttl));
    grant_request(&timestamp.to_string(), &signature, grant_body(ip, ttl))
}

pub fn grant_request(timestamp: &str, signature: &str, body: String) -> Request<Body> {
    Request::post("/allow")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// `GET /validate` arriving over a socket from `peer`, without forwarded-for.
pub fn check_from_peer(peer: SocketAddr) -> Request<Body> {
    let mut request = Request::get("/validate").body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub fn auth_method(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get("x-auth-method")
        .and_then(|v| v.to_str().ok())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
