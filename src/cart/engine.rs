use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::SessionManager;
use crate::models::{CartItem, Order, Product, VerificationOutcome};
use crate::storage::{keys, LocalStore};

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Product is out of stock")]
    OutOfStock,

    /// The requested quantity exceeds what the backend reports in stock.
    #[error("Only {available} left in stock")]
    InsufficientStock { available: i64 },

    #[error("Product not found")]
    ProductNotFound,

    #[error("Variant not found")]
    VariantNotFound,

    #[error("Sign in to check out")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Cart reconciliation engine.
///
/// Holds the working set of cart lines, merged by line identity
/// (product + optional variant). Adds always verify price and stock
/// against a fresh catalog read first; a cached answer would let a
/// sold-out product into the cart.
pub struct CartEngine {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    store: Arc<LocalStore>,
    items: Mutex<Vec<CartItem>>,
}

impl CartEngine {
    /// Build the engine, rehydrating any persisted cart so lines survive
    /// a restart.
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>, store: Arc<LocalStore>) -> Self {
        let items: Vec<CartItem> = store.get(keys::CART).unwrap_or_default();
        if !items.is_empty() {
            debug!(lines = items.len(), "Rehydrated persisted cart");
        }
        Self {
            api,
            session,
            store,
            items: Mutex::new(items),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CartItem>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current cart lines.
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().clone()
    }

    /// Total number of units across all lines.
    pub fn count(&self) -> u32 {
        self.lock().iter().map(|item| item.quantity).sum()
    }

    /// Cart total, recomputed from the lines on every call rather than
    /// kept as a running figure that could drift.
    pub fn total(&self) -> Decimal {
        self.lock().iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn persist(&self, items: &[CartItem]) {
        self.store.set(keys::CART, &items);
    }

    fn replace_items(&self, items: Vec<CartItem>) {
        // A server cart can carry zeroed lines after concurrent updates;
        // they never survive adoption.
        let items: Vec<CartItem> = items.into_iter().filter(|item| item.quantity > 0).collect();
        self.persist(&items);
        *self.lock() = items;
    }

    /// Verify a prospective line against a fresh catalog read and return
    /// the authoritative price and stock.
    async fn verify(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
    ) -> Result<(Product, VerificationOutcome), CartError> {
        let product = match self.api.product_fresh(product_id).await {
            Ok(product) => product,
            Err(e) if e.is_not_found() => return Err(CartError::ProductNotFound),
            Err(e) => return Err(e.into()),
        };

        let outcome = match variant_id {
            Some(id) => {
                let variant = product.variant(id).ok_or(CartError::VariantNotFound)?;
                VerificationOutcome {
                    price: variant.price.unwrap_or(product.price),
                    stock: variant.stock,
                }
            }
            None => VerificationOutcome {
                price: product.price,
                stock: product.stock,
            },
        };
        Ok((product, outcome))
    }

    /// Add `quantity` units of a product (or one of its variants).
    ///
    /// Zero quantity is a no-op. Verification failures leave the cart
    /// untouched. For a signed-in user the server add is attempted first
    /// and the authoritative cart re-fetched; if either step fails the
    /// line is merged locally so the add never silently disappears.
    pub async fn add_item(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Ok(());
        }

        let (product, outcome) = self.verify(product_id, variant_id).await?;
        if !outcome.available() {
            return Err(CartError::OutOfStock);
        }
        if outcome.stock < i64::from(quantity) {
            return Err(CartError::InsufficientStock {
                available: outcome.stock,
            });
        }

        if self.session.is_authenticated() {
            match self.remote_add(product_id, variant_id, quantity).await {
                Ok(items) => {
                    self.replace_items(items);
                    return Ok(());
                }
                Err(e) => {
                    warn!(product_id, error = %e, "Server add failed, merging locally");
                }
            }
        }

        self.merge_local(&product, variant_id, quantity, outcome.price);
        Ok(())
    }

    async fn remote_add(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: u32,
    ) -> Result<Vec<CartItem>, ApiError> {
        self.api.add_to_cart(product_id, variant_id, quantity).await?;
        self.api.fetch_cart().await
    }

    /// Merge a verified line into the local cart: an existing line with
    /// the same identity grows, otherwise a new line is appended.
    fn merge_local(
        &self,
        product: &Product,
        variant_id: Option<i64>,
        quantity: u32,
        verified_price: Decimal,
    ) {
        let mut items = self.lock();
        match items
            .iter_mut()
            .find(|item| item.same_line(product.id, variant_id))
        {
            Some(line) => line.quantity += quantity,
            None => items.push(CartItem::from_product(
                product,
                quantity,
                variant_id,
                verified_price,
            )),
        }
        let snapshot = items.clone();
        drop(items);
        self.persist(&snapshot);
    }

    /// Remove the line matching `(product_id, variant_id)`. Removing a
    /// line that is not in the cart is a no-op, not an error.
    pub async fn remove_item(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
    ) -> Result<(), CartError> {
        let remote_item_id = self
            .lock()
            .iter()
            .find(|item| item.same_line(product_id, variant_id))
            .map(|item| item.remote_item_id);
        let Some(remote_item_id) = remote_item_id else {
            return Ok(());
        };

        if self.session.is_authenticated() {
            if let Some(item_id) = remote_item_id {
                match self.remote_remove(item_id).await {
                    Ok(items) => {
                        self.replace_items(items);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(item_id, error = %e, "Server remove failed, removing locally");
                    }
                }
            }
        }

        let mut items = self.lock();
        items.retain(|item| !item.same_line(product_id, variant_id));
        let snapshot = items.clone();
        drop(items);
        self.persist(&snapshot);
        Ok(())
    }

    async fn remote_remove(&self, item_id: i64) -> Result<Vec<CartItem>, ApiError> {
        self.api.delete_cart_item(item_id).await?;
        self.api.fetch_cart().await
    }

    /// Set the quantity of an existing line. Zero (or less, through the
    /// server payloads) removes the line instead of keeping an empty one.
    pub async fn update_quantity(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id, variant_id).await;
        }

        let remote_item_id = self
            .lock()
            .iter()
            .find(|item| item.same_line(product_id, variant_id))
            .map(|item| item.remote_item_id);
        let Some(remote_item_id) = remote_item_id else {
            return Ok(());
        };

        if self.session.is_authenticated() {
            if let Some(item_id) = remote_item_id {
                match self.remote_update(item_id, quantity).await {
                    Ok(items) => {
                        self.replace_items(items);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(item_id, error = %e, "Server update failed, updating locally");
                    }
                }
            }
        }

        let mut items = self.lock();
        if let Some(line) = items
            .iter_mut()
            .find(|item| item.same_line(product_id, variant_id))
        {
            line.quantity = quantity;
        }
        let snapshot = items.clone();
        drop(items);
        self.persist(&snapshot);
        Ok(())
    }

    async fn remote_update(&self, item_id: i64, quantity: u32) -> Result<Vec<CartItem>, ApiError> {
        self.api.update_cart_item(item_id, quantity).await?;
        self.api.fetch_cart().await
    }

    /// Replace the working set with the authoritative server cart. For an
    /// anonymous visitor there is no server cart, so this is a no-op.
    pub async fn refresh(&self) -> Result<(), CartError> {
        if !self.session.is_authenticated() {
            return Ok(());
        }
        let items = self.api.fetch_cart().await?;
        debug!(lines = items.len(), "Server cart fetched");
        self.replace_items(items);
        Ok(())
    }

    /// Convert the server cart into an order. Requires a session: the
    /// backend has no cart to check out for an anonymous visitor.
    pub async fn checkout(&self, address_id: i64) -> Result<Order, CartError> {
        if !self.session.is_authenticated() {
            return Err(CartError::NotAuthenticated);
        }
        let order = self.api.checkout(address_id).await?;
        info!(order_id = order.id, "Checkout complete");
        self.clear_local();
        Ok(order)
    }

    /// Drop every local line. Server state is untouched.
    pub fn clear_local(&self) {
        self.replace_items(Vec::new());
    }
}
