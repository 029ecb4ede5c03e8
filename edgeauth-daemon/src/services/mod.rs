//! Cross-cutting request services.

mod rate_limit;

pub use rate_limit::{limit_grants, GrantRateLimiter, RateLimited};
