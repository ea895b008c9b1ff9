//! HTTP facade for the storefront backend.
//!
//! `ApiClient` is the single place that knows URLs, auth headers, response
//! normalization, and which cache domains each mutation invalidates. The
//! rest of the crate talks in domain types only.

mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;
