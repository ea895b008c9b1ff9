//! Data models for the storefront backend.
//!
//! Every external entity is normalized exactly once, at this boundary:
//! loose backend payloads (alternate key spellings, prices as numbers or
//! display strings) are mapped into strict records so internal code never
//! branches on field-name variants.
//!
//! - `Product`, `Variant`: catalog entries with stock and decimal prices
//! - `CartItem`: one cart line, local or server-synced
//! - `Order`, `OrderItem`, `OrderStatus`: order history
//! - `Address`, `AddressInput`: saved shipping addresses
//! - `UserProfile`, `ProfileUpdate`: the signed-in account

pub mod address;
pub mod cart;
pub mod order;
pub mod price;
pub mod product;
pub mod user;

pub use address::{Address, AddressInput};
pub use cart::{normalize_remote_cart, CartItem};
pub use order::{Order, OrderItem, OrderStatus};
pub use product::{Product, Variant, VerificationOutcome};
pub use user::{ProfileUpdate, UserProfile};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Parse a list endpoint payload that may be a bare array or an object
/// wrapping the array under one of `keys` (the backend uses both shapes).
pub(crate) fn list_from_value<T: DeserializeOwned>(payload: Value, keys: &[&str]) -> Vec<T> {
    if payload.is_array() {
        return match serde_json::from_value(payload) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Failed to parse list payload");
                Vec::new()
            }
        };
    }
    if let Value::Object(mut map) = payload {
        for key in keys {
            if let Some(inner) = map.remove(*key) {
                if inner.is_array() {
                    return list_from_value(inner, &[]);
                }
            }
        }
    }
    Vec::new()
}
