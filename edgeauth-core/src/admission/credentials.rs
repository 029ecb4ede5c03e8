//! Extraction of the client address and auth token from check requests.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use std::net::IpAddr;

/// Client address as reported by the reverse proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Primary token header.
pub const PRIMARY_TOKEN_HEADER: &str = "x-emby-token";

/// Legacy token header, consulted when the primary one is absent.
pub const LEGACY_TOKEN_HEADER: &str = "x-mediabrowser-token";

/// Scheme prefix of a structured `Authorization` value.
const AUTHORIZATION_SCHEME: &str = "MediaBrowser";

/// Quoted token field inside a structured `Authorization` value.
const TOKEN_FIELD: &str = "token=\"";

/// What the gate needs to know about a check request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckRequest {
    /// Client IP text; may be empty when nothing is known.
    pub client_ip: String,
    /// Opaque auth token; empty when the request carried none.
    pub token: String,
}

impl CheckRequest {
    /// Build a check request from the proxy's headers and the peer address.
    ///
    /// The forwarded-for value is taken raw. The proxy in front of us is
    /// trusted to have set it to a single sanitized address.
    ///
    /// The peer address is used only when the header is absent or blank. A
    /// header that is present but not visible ASCII yields an empty client IP,
    /// which no grant can match; the peer is the proxy itself.
    pub fn from_headers(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        let peer_ip = || peer.map(|ip| ip.to_string()).unwrap_or_default();

        let client_ip = match headers.get(FORWARDED_FOR_HEADER).map(|v| v.to_str()) {
            Some(Ok(ip)) if !ip.trim().is_empty() => ip.trim().to_string(),
            Some(Ok(_)) | None => peer_ip(),
            Some(Err(_)) => String::new(),
        };

        Self {
            client_ip,
            token: extract_token(headers),
        }
    }
}

/// Pull the auth token out of request headers.
///
/// Sources in priority order, first present wins:
/// 1. `X-Emby-Token`
/// 2. `X-MediaBrowser-Token`
/// 3. `Authorization: MediaBrowser ..., Token="..."`
///
/// Returns an empty string when none of them yields a token.
pub fn extract_token(headers: &HeaderMap) -> String {
    for name in [PRIMARY_TOKEN_HEADER, LEGACY_TOKEN_HEADER] {
        if let Some(value) = headers.get(name) {
            return value.to_str().unwrap_or_default().to_string();
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_authorization)
        .map(str::to_string)
        .unwrap_or_default()
}

fn token_from_authorization(value: &str) -> Option<&str> {
    let scheme = value.get(..AUTHORIZATION_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(AUTHORIZATION_SCHEME) {
        return None;
    }

    // ASCII lowercasing keeps byte offsets intact
    let lowered = value.to_ascii_lowercase();
    let start = lowered.find(TOKEN_FIELD)? + TOKEN_FIELD.len();
    let len = value[start..].find('"')?;
    Some(&value[start..start + len])
}
