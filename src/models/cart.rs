use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::price;
use super::product::Product;

/// One line of the cart, identified by `(product_id, variant_id)`.
///
/// `unit_price` is the backend-verified price captured at add time;
/// `variant_price` overrides it when the line refers to a variant.
/// `remote_item_id` correlates the line with its server-side cart row once
/// synced; it is absent for lines that only exist locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    #[serde(default)]
    pub variant_id: Option<i64>,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub variant_price: Option<Decimal>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variant_label: Option<String>,
    #[serde(default)]
    pub remote_item_id: Option<i64>,
}

impl CartItem {
    /// Build a local line from a verified catalog product.
    pub fn from_product(
        product: &Product,
        quantity: u32,
        variant_id: Option<i64>,
        verified_price: Decimal,
    ) -> Self {
        let variant = variant_id.and_then(|id| product.variant(id));
        // The verified price is authoritative; it lands on the variant slot
        // when the line refers to a variant, on the base slot otherwise.
        let (unit_price, variant_price) = if variant.is_some() {
            (product.price, Some(verified_price))
        } else {
            (verified_price, None)
        };
        Self {
            product_id: product.id,
            variant_id,
            quantity,
            unit_price,
            variant_price,
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            variant_label: variant.and_then(|v| v.label()),
            remote_item_id: None,
        }
    }

    /// Two items are the same line iff product and variant match; both
    /// variants absent counts as a match.
    pub fn same_line(&self, product_id: i64, variant_id: Option<i64>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }

    /// Variant price when present, base unit price otherwise.
    pub fn effective_price(&self) -> Decimal {
        self.variant_price.unwrap_or(self.unit_price)
    }

    pub fn line_total(&self) -> Decimal {
        self.effective_price() * Decimal::from(self.quantity)
    }
}

/// Raw server cart payload: `GET /cart/` returns `{ "items": [...] }`.
#[derive(Debug, Deserialize)]
struct RemoteCart {
    #[serde(default)]
    items: Vec<RemoteCartItem>,
}

/// One server-side cart row, with every field spelling the backend has been
/// observed to use. Normalized into `CartItem` exactly once, here.
#[derive(Debug, Default, Deserialize)]
struct RemoteCartItem {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    item_id: Option<i64>,
    #[serde(default)]
    product_id: Option<i64>,
    #[serde(default)]
    variant_id: Option<i64>,
    #[serde(default, alias = "qty")]
    quantity: Option<u32>,
    #[serde(default, alias = "name")]
    product_name: Option<String>,
    #[serde(default, deserialize_with = "price::de_opt_decimal")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "price::de_opt_decimal")]
    display_price: Option<Decimal>,
    #[serde(default, deserialize_with = "price::de_opt_decimal")]
    variant_price: Option<Decimal>,
    #[serde(default, alias = "imageUrl")]
    image_url: Option<String>,
    #[serde(default, alias = "variantName")]
    variant_name: Option<String>,
    #[serde(default, alias = "variantSize")]
    variant_size: Option<String>,
}

impl RemoteCartItem {
    fn normalize(self) -> CartItem {
        let unit_price = self
            .price
            .or(self.display_price)
            .unwrap_or_default();
        let variant_label = match (self.variant_name, self.variant_size) {
            (Some(name), Some(size)) => Some(format!("{} ({})", name, size)),
            (Some(name), None) => Some(name),
            (None, Some(size)) => Some(size),
            (None, None) => None,
        };
        CartItem {
            product_id: self.product_id.or(self.variant_id).or(self.id).unwrap_or(0),
            variant_id: self.variant_id,
            quantity: self.quantity.unwrap_or(1),
            unit_price,
            variant_price: self.variant_price,
            name: self.product_name.unwrap_or_default(),
            image_url: self.image_url,
            variant_label,
            remote_item_id: self.item_id.or(self.id),
        }
    }
}

/// Normalize the `GET /cart/` payload into cart lines.
pub fn normalize_remote_cart(payload: Value) -> Vec<CartItem> {
    let cart: RemoteCart = match serde_json::from_value(payload) {
        Ok(cart) => cart,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse server cart payload");
            return Vec::new();
        }
    };
    cart.items.into_iter().map(RemoteCartItem::normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_line_matches_on_product_and_variant() {
        let item = CartItem {
            product_id: 4,
            variant_id: Some(41),
            quantity: 1,
            unit_price: Decimal::new(500, 0),
            variant_price: None,
            name: "Rose Attar".into(),
            image_url: None,
            variant_label: None,
            remote_item_id: None,
        };
        assert!(item.same_line(4, Some(41)));
        assert!(!item.same_line(4, None));
        assert!(!item.same_line(5, Some(41)));
    }

    #[test]
    fn effective_price_prefers_variant_price() {
        let mut item = CartItem {
            product_id: 1,
            variant_id: Some(11),
            quantity: 2,
            unit_price: Decimal::new(1000, 0),
            variant_price: Some(Decimal::new(1200, 0)),
            name: String::new(),
            image_url: None,
            variant_label: None,
            remote_item_id: None,
        };
        assert_eq!(item.effective_price(), Decimal::new(1200, 0));
        assert_eq!(item.line_total(), Decimal::new(2400, 0));

        item.variant_price = None;
        assert_eq!(item.effective_price(), Decimal::new(1000, 0));
        assert_eq!(item.line_total(), Decimal::new(2000, 0));
    }

    #[test]
    fn normalizes_server_rows_across_field_spellings() {
        let payload = serde_json::json!({
            "items": [
                {
                    "item_id": 901,
                    "product_id": 4,
                    "variant_id": 41,
                    "product_name": "Rose Attar",
                    "price": "₹750",
                    "variant_price": 800,
                    "quantity": 2,
                    "variant_name": "Attar",
                    "variant_size": "12ml"
                },
                {
                    "id": 902,
                    "name": "Musk",
                    "display_price": "₹1,100",
                    "qty": 1
                }
            ]
        });

        let items = normalize_remote_cart(payload);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].product_id, 4);
        assert_eq!(items[0].remote_item_id, Some(901));
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit_price, Decimal::new(750, 0));
        assert_eq!(items[0].variant_price, Some(Decimal::new(800, 0)));
        assert_eq!(items[0].variant_label.as_deref(), Some("Attar (12ml)"));

        // Second row only has an `id`: it is used for both identity and the
        // remote row correlation, and `qty` stands in for quantity.
        assert_eq!(items[1].product_id, 902);
        assert_eq!(items[1].remote_item_id, Some(902));
        assert_eq!(items[1].quantity, 1);
        assert_eq!(items[1].unit_price, Decimal::new(1100, 0));
        assert_eq!(items[1].name, "Musk");
    }

    #[test]
    fn unparseable_cart_payload_reads_as_empty() {
        assert!(normalize_remote_cart(serde_json::json!("nope")).is_empty());
        assert!(normalize_remote_cart(serde_json::json!({})).is_empty());
    }
}
