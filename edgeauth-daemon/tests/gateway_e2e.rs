//! End-to-end tests for the check and grant routes.
//!
//! These tests verify:
//! 1. Token and temporary-IP admission through `/validate`
//! 2. Every failure class of `/allow` maps to its own status
//! 3. Grants, revocations and strict mode as seen by the proxy

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use edgeauth_core::StaticSecret;
use edgeauth_daemon::DaemonConfig;

const IP: &str = "203.0.113.7";

// ============================================================================
// Check route
// ============================================================================

#[tokio::test]
async fn test_no_token_no_grant_is_denied() {
    let gw = TestGateway::new();
    let response = gw.check(Some(IP), &[]).await;

    assert_status(&response, StatusCode::UNAUTHORIZED);
    assert!(auth_method(&response).is_none());
}

#[tokio::test]
async fn test_live_token_is_admitted_by_token() {
    let gw = TestGateway::new();

    for header in [
        ("x-emby-token", LIVE_TOKEN.to_string()),
        ("x-mediabrowser-token", LIVE_TOKEN.to_string()),
        (
            "authorization",
            format!("MediaBrowser Client=\"web\", Token=\"{LIVE_TOKEN}\""),
        ),
    ] {
        let response = gw.check(Some(IP), &[(header.0, header.1.as_str())]).await;
        assert_status(&response, StatusCode::OK);
        assert_eq!(auth_method(&response), Some("token"));
    }
}

#[tokio::test]
async fn test_unknown_token_denied_until_grant() {
    let gw = TestGateway::new();
    let token = [("x-emby-token", "well-formed-but-unknown")];

    assert_status(&gw.check(Some(IP), &token).await, StatusCode::UNAUTHORIZED);

    assert_status(&gw.grant(IP, 300).await, StatusCode::OK);

    let response = gw.check(Some(IP), &token).await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(auth_method(&response), Some("ip-temp"));
}

#[tokio::test]
async fn test_grant_is_per_ip() {
    let gw = TestGateway::new();
    assert_status(&gw.grant(IP, 300).await, StatusCode::OK);

    assert_status(
        &gw.check(Some("198.51.100.9"), &[]).await,
        StatusCode::UNAUTHORIZED,
    );
}

#[tokio::test]
async fn test_peer_address_used_without_forwarded_for() {
    let gw = TestGateway::new();
    assert_status(&gw.grant("127.0.0.1", 300).await, StatusCode::OK);

    let response = gw.send(check_from_peer("127.0.0.1:40000".parse().unwrap())).await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(auth_method(&response), Some("ip-temp"));
}

#[tokio::test]
async fn test_undecodable_forwarded_for_ignores_proxy_grant() {
    let gw = TestGateway::new();
    assert_status(&gw.grant("127.0.0.1", 300).await, StatusCode::OK);

    let mut request = check_from_peer("127.0.0.1:40000".parse().unwrap());
    request.headers_mut().insert(
        "x-forwarded-for",
        axum::http::HeaderValue::from_bytes(b"203.0.113.\xff").unwrap(),
    );

    assert_status(&gw.send(request).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authority_down_still_allows_ip_path() {
    let gw = TestGateway::with(
        DaemonConfig::default(),
        Arc::new(DownAuthority),
        StaticSecret::new(SECRET),
    );
    let token = [("x-emby-token", LIVE_TOKEN)];

    assert_status(&gw.check(Some(IP), &token).await, StatusCode::UNAUTHORIZED);

    assert_status(&gw.grant(IP, 300).await, StatusCode::OK);
    let response = gw.check(Some(IP), &token).await;
    assert_eq!(auth_method(&response), Some("ip-temp"));
}

#[tokio::test]
async fn test_strict_login_only_ignores_grants() {
    let config = DaemonConfig {
        strict_login_only: true,
        ..DaemonConfig::default()
    };
    let gw = TestGateway::with(config, Arc::new(FakeAuthority), StaticSecret::new(SECRET));

    assert_status(&gw.grant(IP, 300).await, StatusCode::OK);
    assert_status(&gw.check(Some(IP), &[]).await, StatusCode::UNAUTHORIZED);

    let response = gw.check(Some(IP), &[("x-emby-token", LIVE_TOKEN)]).await;
    assert_eq!(auth_method(&response), Some("token"));
}

#[tokio::test]
async fn test_session_start_revokes_grant() {
    let gw = TestGateway::new();
    assert_status(&gw.grant(IP, 300).await, StatusCode::OK);

    assert!(gw
        .gateway
        .session_observer()
        .on_session_started(&format!("{IP}:52144")));

    assert_status(&gw.check(Some(IP), &[]).await, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Grant route
// ============================================================================

#[tokio::test]
async fn test_successful_grant_body() {
    let gw = TestGateway::new();
    let response = gw.grant(IP, 60).await;

    assert_status(&response, StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));
    assert!(gw.gateway.store().exists(IP));
}

#[tokio::test]
async fn test_grant_without_ttl_signed_as_300() {
    let gw = TestGateway::new();
    let ts = now();
    let signature = edgeauth_core::signing::sign(
        &edgeauth_core::AdminSecret::new(SECRET).unwrap(),
        &format!("POST\n/allow\n{ts}\n{IP}\n300"),
    );
    let body = serde_json::json!({ "ip": IP }).to_string();

    let response = gw.send(grant_request(&ts.to_string(), &signature, body)).await;
    assert_status(&response, StatusCode::OK);
    assert!(gw.gateway.store().exists(IP));
}

#[tokio::test]
async fn test_missing_secret_is_500() {
    let gw = TestGateway::with(
        DaemonConfig::default(),
        Arc::new(FakeAuthority),
        StaticSecret::unset(),
    );
    let response = gw.grant(IP, 60).await;

    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "admin secret not set" })
    );
    assert!(gw.gateway.store().is_empty());
}

#[tokio::test]
async fn test_missing_headers_is_400() {
    let gw = TestGateway::new();
    let request = axum::http::Request::post("/allow")
        .body(axum::body::Body::from(grant_body(IP, 60)))
        .unwrap();

    assert_status(&gw.send(request).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_integer_timestamp_is_400() {
    let gw = TestGateway::new();
    let request = grant_request("yesterday", "00", grant_body(IP, 60));

    assert_status(&gw.send(request).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_and_early_timestamps_are_401() {
    let gw = TestGateway::new();

    for offset in [-3600, 3600] {
        let request = signed_grant(SECRET, now() + offset, IP, 60);
        assert_status(&gw.send(request).await, StatusCode::UNAUTHORIZED);
    }
    assert!(gw.gateway.store().is_empty());
}

#[tokio::test]
async fn test_wrong_secret_is_403() {
    let gw = TestGateway::new();
    let request = signed_grant("not-the-secret", now(), IP, 60);

    assert_status(&gw.send(request).await, StatusCode::FORBIDDEN);
    assert!(gw.gateway.store().is_empty());
}

#[tokio::test]
async fn test_tampered_ip_is_403() {
    let gw = TestGateway::new();
    let ts = now();
    let signature = edgeauth_core::signing::sign(
        &edgeauth_core::AdminSecret::new(SECRET).unwrap(),
        &edgeauth_core::signing::canonical_string(ts, IP, 60),
    );
    let request = grant_request(&ts.to_string(), &signature, grant_body("198.51.100.1", 60));

    assert_status(&gw.send(request).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replayed_grant_is_accepted_again() {
    let gw = TestGateway::new();
    let ts = now();

    assert_status(&gw.send(signed_grant(SECRET, ts, IP, 60)).await, StatusCode::OK);
    gw.gateway.store().revoke_by_ip(IP);
    assert_status(&gw.send(signed_grant(SECRET, ts, IP, 60)).await, StatusCode::OK);
    assert!(gw.gateway.store().exists(IP));
}

#[tokio::test]
async fn test_grant_rate_limit_is_429() {
    let config = DaemonConfig {
        grant_rate_per_second: 1,
        grant_burst: 2,
        ..DaemonConfig::default()
    };
    let gw = TestGateway::with(config, Arc::new(FakeAuthority), StaticSecret::new(SECRET));

    assert_status(&gw.grant(IP, 60).await, StatusCode::OK);
    assert_status(&gw.grant(IP, 60).await, StatusCode::OK);
    assert_status(&gw.grant(IP, 60).await, StatusCode::TOO_MANY_REQUESTS);

    // The check route is never limited
    assert_status(&gw.check(Some(IP), &[]).await, StatusCode::OK);
}
