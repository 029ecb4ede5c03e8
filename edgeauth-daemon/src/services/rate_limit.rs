//! Rate limiting for the grant endpoint.
//!
//! Grants are cheap to reject but each one costs an HMAC and a secret
//! lookup; the limiter runs before either.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

const DEFAULT_PER_SECOND: NonZeroU32 = NonZeroU32::new(5).unwrap();
const DEFAULT_BURST: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// The grant endpoint is over its quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded")]
pub struct RateLimited;

/// Rate limiter for grant requests.
#[derive(Clone)]
pub struct GrantRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl GrantRateLimiter {
    /// Create a new rate limiter with the specified requests per second and burst size.
    ///
    /// # Arguments
    ///
    /// * `per_second` - Number of requests allowed per second (sustained rate)
    /// * `burst_size` - Maximum burst size (allows temporary spikes)
    ///
    /// Zero for either falls back to the default (5/s, burst 20).
    pub fn new(per_second: u32, burst_size: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(DEFAULT_PER_SECOND);
        let burst_size = NonZeroU32::new(burst_size).unwrap_or(DEFAULT_BURST);

        let quota = Quota::per_second(per_second).allow_burst(burst_size);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Check if a request should be allowed.
    pub fn check(&self) -> Result<(), RateLimited> {
        self.limiter.check().map_err(|_| {
            tracing::warn!("Rate limit exceeded for grant endpoint");
            RateLimited
        })
    }
}

impl Default for GrantRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PER_SECOND.get(), DEFAULT_BURST.get())
    }
}

/// Middleware answering `429` once the grant quota is spent.
pub async fn limit_grants(
    State(limiter): State<GrantRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(_) => StatusCode::TOO_MANY_REQUESTS.into_response(),
    }
}
