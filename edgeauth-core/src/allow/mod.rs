//! Ephemeral IP allow store.
//!
//! Maps a normalized IP address to the instant its admission lapses.
//! Nothing is persisted: a process restart revokes every grant.

use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Upper bound used when `now + ttl` does not fit in an [`Instant`].
const MAX_HORIZON: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Concurrent TTL-keyed set of admitted IP addresses.
///
/// # Concurrency
///
/// - Key-partitioned via `DashMap`; unrelated IPs never share a lock
/// - `add`, `exists` and `revoke_by_ip` are atomic per key
/// - Expired entries are evicted lazily by `exists`, there is no sweeper
///
/// # Usage
///
/// ```
/// use edgeauth_core::allow::EphemeralAllowStore;
/// use std::time::Duration;
///
/// let store = EphemeralAllowStore::new();
/// store.add("203.0.113.7", Duration::from_secs(300));
/// assert!(store.exists("203.0.113.7"));
/// ```
#[derive(Debug, Default)]
pub struct EphemeralAllowStore {
    /// normalized ip -> absolute expiry
    entries: DashMap<String, Instant>,
}

impl EphemeralAllowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `ip` for `ttl` from now, replacing any earlier grant.
    ///
    /// A blank `ip` is ignored. `ttl` is taken as-is; limiting it is the
    /// caller's policy.
    pub fn add(&self, ip: &str, ttl: Duration) {
        self.add_at(ip, ttl, Instant::now());
    }

    /// Same as [`add`](Self::add) with an explicit clock reading.
    pub fn add_at(&self, ip: &str, ttl: Duration, now: Instant) {
        let Some(key) = normalize_ip(ip) else {
            return;
        };
        // Last write wins: a repeated grant replaces the expiry, it never extends it
        self.entries.insert(key, expiry(now, ttl));
    }

    /// Whether `ip` currently holds a live grant.
    pub fn exists(&self, ip: &str) -> bool {
        self.exists_at(ip, Instant::now())
    }

    /// Same as [`exists`](Self::exists) with an explicit clock reading.
    ///
    /// An entry found expired is removed before returning `false`.
    pub fn exists_at(&self, ip: &str, now: Instant) -> bool {
        let Some(key) = normalize_ip(ip) else {
            return false;
        };

        let Some(until) = self.entries.get(&key).map(|entry| *entry.value()) else {
            return false;
        };
        if now < until {
            return true;
        }

        // Re-check under the shard write lock so a grant that raced in after
        // the read above is not thrown away.
        self.entries.remove_if(&key, |_, until| now >= *until);
        false
    }

    /// Drop any grant for `ip`, live or expired.
    ///
    /// Returns `true` if an entry was removed.
    pub fn revoke_by_ip(&self, ip: &str) -> bool {
        match normalize_ip(ip) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical key for an IP.
///
/// Whitespace is trimmed and IP literals are re-rendered in their canonical
/// form, so `2001:DB8::1` and `2001:db8:0::1` share one entry. Anything that is
/// not an IP literal (e.g. an unsanitized forwarded header) is kept verbatim.
pub fn normalize_ip(ip: &str) -> Option<String> {
    let ip = ip.trim();
    if ip.is_empty() {
        return None;
    }
    match ip.parse::<IpAddr>() {
        Ok(addr) => Some(addr.to_string()),
        Err(_) => Some(ip.to_string()),
    }
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(MAX_HORIZON))
        .unwrap_or(now)
}
