use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price;

/// A catalog product. Parsed directly from the backend payload; alternate
/// field spellings are absorbed here so nothing downstream branches on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(alias = "product_name", default)]
    pub name: String,
    #[serde(default, deserialize_with = "price::de_decimal")]
    pub price: Decimal,
    /// Units in stock for the base product. Variant stock lives on the
    /// variant record.
    #[serde(default)]
    pub stock: i64,
    #[serde(alias = "imageUrl", alias = "image", default)]
    pub image_url: Option<String>,
    #[serde(alias = "shortDescription", alias = "description", default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// A purchasable variant of a product (size/concentration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(alias = "variant_name", default)]
    pub name: Option<String>,
    #[serde(alias = "variant_size", default)]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "price::de_opt_decimal")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: i64,
}

impl Variant {
    /// Human-readable label, preferring the name and falling back to size.
    pub fn label(&self) -> Option<String> {
        match (&self.name, &self.size) {
            (Some(name), Some(size)) => Some(format!("{} ({})", name, size)),
            (Some(name), None) => Some(name.clone()),
            (None, Some(size)) => Some(size.clone()),
            (None, None) => None,
        }
    }
}

impl Product {
    pub fn variant(&self, variant_id: i64) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

/// Result of the mandatory pre-add verification: the authoritative price
/// and stock for a product (or one of its variants), fetched fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub price: Decimal,
    pub stock: i64,
}

impl VerificationOutcome {
    pub fn available(&self) -> bool {
        self.stock > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_product_with_loose_fields() {
        let json = serde_json::json!({
            "id": 7,
            "product_name": "Oud Royale",
            "price": "₹2,499.00",
            "stock": 12,
            "imageUrl": "https://cdn.example/oud.jpg",
            "description": "Deep and smoky",
            "variants": [
                {"id": 71, "variant_name": "Eau de Parfum", "variant_size": "50ml", "price": 2499, "stock": 5}
            ]
        });

        let product: Product = serde_json::from_value(json).expect("parse");
        assert_eq!(product.name, "Oud Royale");
        assert_eq!(product.price, Decimal::new(249900, 2));
        assert_eq!(product.image_url.as_deref(), Some("https://cdn.example/oud.jpg"));
        assert_eq!(product.short_description.as_deref(), Some("Deep and smoky"));

        let variant = product.variant(71).expect("variant");
        assert_eq!(variant.price, Some(Decimal::new(2499, 0)));
        assert_eq!(variant.label().as_deref(), Some("Eau de Parfum (50ml)"));
        assert!(product.variant(99).is_none());
    }

    #[test]
    fn missing_price_reads_as_zero() {
        let product: Product =
            serde_json::from_value(serde_json::json!({"id": 1, "name": "Bare"})).expect("parse");
        assert_eq!(product.price, Decimal::ZERO);
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn verification_outcome_availability() {
        let in_stock = VerificationOutcome { price: Decimal::new(100, 0), stock: 3 };
        let sold_out = VerificationOutcome { price: Decimal::new(100, 0), stock: 0 };
        assert!(in_stock.available());
        assert!(!sold_out.available());
    }
}
