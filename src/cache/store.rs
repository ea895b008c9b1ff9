use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Products stay fresh for 5 minutes; the catalog changes slowly and stock
/// is re-verified on every cart add anyway.
const PRODUCTS_TTL_MINUTES: i64 = 5;

/// Profile data stays fresh for 10 minutes.
const USER_TTL_MINUTES: i64 = 10;

/// The server cart is re-fetched after every mutation, so a short TTL is
/// enough to absorb bursts of reads.
const CART_TTL_MINUTES: i64 = 1;

/// Order history stays fresh for 5 minutes.
const ORDERS_TTL_MINUTES: i64 = 5;

/// Saved addresses stay fresh for 10 minutes.
const ADDRESSES_TTL_MINUTES: i64 = 10;

/// Named caches. Each domain is logically independent: invalidating one
/// never affects the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    Products,
    User,
    Cart,
    Orders,
    Addresses,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 5] = [
        CacheDomain::Products,
        CacheDomain::User,
        CacheDomain::Cart,
        CacheDomain::Orders,
        CacheDomain::Addresses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDomain::Products => "products",
            CacheDomain::User => "user",
            CacheDomain::Cart => "cart",
            CacheDomain::Orders => "orders",
            CacheDomain::Addresses => "addresses",
        }
    }

    /// How long entries in this domain stay fresh.
    pub fn default_ttl(&self) -> Duration {
        let minutes = match self {
            CacheDomain::Products => PRODUCTS_TTL_MINUTES,
            CacheDomain::User => USER_TTL_MINUTES,
            CacheDomain::Cart => CART_TTL_MINUTES,
            CacheDomain::Orders => ORDERS_TTL_MINUTES,
            CacheDomain::Addresses => ADDRESSES_TTL_MINUTES,
        };
        Duration::minutes(minutes)
    }
}

impl std::fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Utc::now() - self.fetched_at > self.ttl
    }
}

/// A cache read. The value is returned even when expired; `is_stale` tells
/// the caller whether a background refresh is due (stale-while-revalidate).
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub is_stale: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<(CacheDomain, String), CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(CacheDomain, String), CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Read the entry under `(domain, key)`, expired or not. Entries that no
    /// longer deserialize as `T` read as a miss.
    pub fn get<T: DeserializeOwned>(&self, domain: CacheDomain, key: &str) -> Option<Cached<T>> {
        let entries = self.lock();
        let entry = entries.get(&(domain, key.to_string()))?;
        let is_stale = entry.is_expired();
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(Cached {
                value,
                is_stale,
                fetched_at: entry.fetched_at,
            }),
            Err(e) => {
                warn!(domain = %domain, key, error = %e, "Cached value failed to deserialize");
                None
            }
        }
    }

    /// Store `value` under `(domain, key)` with the given TTL, replacing any
    /// previous entry. Serialization failure drops the entry with a warning
    /// rather than surfacing an error.
    pub fn set<T: Serialize>(&self, domain: CacheDomain, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(domain = %domain, key, error = %e, "Failed to serialize cache value");
                return;
            }
        };
        self.lock().insert(
            (domain, key.to_string()),
            CacheEntry {
                value,
                fetched_at: Utc::now(),
                ttl,
            },
        );
    }

    /// Whether the entry under `(domain, key)` is past its TTL. Absent
    /// entries count as expired.
    pub fn is_expired(&self, domain: CacheDomain, key: &str) -> bool {
        self.lock()
            .get(&(domain, key.to_string()))
            .map(CacheEntry::is_expired)
            .unwrap_or(true)
    }

    /// Drop every entry in one domain. Other domains are untouched.
    pub fn invalidate(&self, domain: CacheDomain) {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(d, _), _| *d != domain);
        debug!(domain = %domain, dropped = before - entries.len(), "Cache domain invalidated");
    }

    /// Drop every entry in every domain. Used on logout so no user-scoped
    /// data can leak into the next session.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "All caches invalidated");
    }

    /// Age the entry under `(domain, key)` by `by`, as if it had been
    /// fetched that much earlier. Test hook for TTL behavior.
    #[cfg(test)]
    pub(crate) fn backdate(&self, domain: CacheDomain, key: &str, by: Duration) {
        if let Some(entry) = self.lock().get_mut(&(domain, key.to_string())) {
            entry.fetched_at -= by;
        }
    }
}
