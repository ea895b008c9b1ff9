//! Client core for a perfume storefront backend.
//!
//! The crate is organized around four pieces:
//!
//! - [`cache`]: named in-memory cache domains with per-entry TTLs and
//!   stale-tagged reads
//! - [`auth`]: session lifecycle, token persistence, and account flows
//! - [`cart`]: the local-first cart with server reconciliation
//! - [`api`]: the HTTP facade that every network call funnels through
//!
//! [`Storefront`] wires them together; embedders that need finer control
//! can assemble the parts themselves.

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod cart;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use app::Storefront;
pub use auth::{AuthError, AuthState, SessionManager};
pub use cache::{CacheDomain, CacheStore};
pub use cart::{CartEngine, CartError};
pub use config::Config;
pub use storage::LocalStore;
