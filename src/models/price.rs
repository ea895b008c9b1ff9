//! Tolerant price parsing.
//!
//! The backend is inconsistent about money: product payloads may carry a
//! bare number, a numeric string, or a display string like `"₹1,299.00"`.
//! Everything is normalized to `rust_decimal::Decimal` at the boundary so
//! internal code never re-parses price strings.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Currency symbol used for display. The backend prices in INR.
const CURRENCY_SYMBOL: &str = "₹";

/// Parse a price string, stripping the currency symbol and thousands
/// separators. Returns `None` for anything that is not a number underneath.
pub fn parse(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(CURRENCY_SYMBOL)
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Extract a decimal from a loose JSON value (number or string).
pub fn from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse(s),
        _ => None,
    }
}

/// Format a price for display, e.g. `₹1299.00`.
pub fn display(amount: Decimal) -> String {
    format!("{}{:.2}", CURRENCY_SYMBOL, amount)
}

/// Deserialize a price field that may arrive as a number or a string.
/// Unparseable values read as zero rather than failing the whole payload.
pub(crate) fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(from_value(&value).unwrap_or_default())
}

/// Deserialize an optional price field; absent, null or unparseable values
/// all read as `None`.
pub(crate) fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(from_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_numbers() {
        assert_eq!(parse("1299"), Some(Decimal::new(1299, 0)));
        assert_eq!(parse("1299.50"), Some(Decimal::new(129950, 2)));
    }

    #[test]
    fn strips_currency_symbol_and_separators() {
        assert_eq!(parse("₹1,299"), Some(Decimal::new(1299, 0)));
        assert_eq!(parse("₹ 2,499.00"), Some(Decimal::new(249900, 2)));
    }

    #[test]
    fn rejects_non_numeric() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("free"), None);
        assert_eq!(parse("₹"), None);
    }

    #[test]
    fn from_value_accepts_numbers_and_strings() {
        assert_eq!(
            from_value(&serde_json::json!(499.5)),
            Some(Decimal::new(4995, 1))
        );
        assert_eq!(
            from_value(&serde_json::json!("₹499.50")),
            Some(Decimal::new(49950, 2))
        );
        assert_eq!(from_value(&serde_json::json!(null)), None);
        assert_eq!(from_value(&serde_json::json!([1])), None);
    }

    #[test]
    fn display_rounds_to_two_places() {
        assert_eq!(display(Decimal::new(12995, 1)), "₹1299.50");
        assert_eq!(display(Decimal::new(1299, 0)), "₹1299.00");
    }
}
