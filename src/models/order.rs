use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price;

/// Order lifecycle states as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// A placed order. The backend is loose about the total field name
/// (`total_amount`, `total`, `amount` have all been observed), so every
/// spelling is absorbed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub address_id: Option<i64>,
    #[serde(
        default,
        alias = "total",
        alias = "amount",
        deserialize_with = "price::de_decimal"
    )]
    pub total_amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default, alias = "qty")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "price::de_decimal")]
    pub price: Decimal,
}
