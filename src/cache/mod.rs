//! In-memory response cache with per-entry TTL.
//!
//! This module provides the `CacheStore` backing the named response caches
//! (products, user, cart, orders, addresses). Entries record when they were
//! fetched and how long they stay fresh; reads return stale entries tagged
//! as such so callers can serve them while revalidating in the background.
//!
//! The store is process-wide and shared via `Arc`; cached values are only
//! mutated through `set`/`invalidate`, never in place.

pub mod store;

pub use store::{CacheDomain, CacheStore, Cached};
