//! Cart state and reconciliation.
//!
//! The cart is local-first: every line lives in memory and in the local
//! store, so an anonymous visitor keeps a working cart with no backend at
//! all. When a session exists the server cart is authoritative and local
//! state is reconciled against it after every mutation; when the server
//! is unreachable, mutations degrade to the local cart instead of
//! failing.

mod engine;

pub use engine::{CartEngine, CartError};
