use serde::{Deserialize, Serialize};

/// A saved shipping address (`/addresses/` resource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Payload for creating or replacing an address.
#[derive(Debug, Clone, Serialize)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
    pub is_default: bool,
}

fn default_country() -> String {
    "India".to_string()
}

impl Default for AddressInput {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            phone: String::new(),
            line1: String::new(),
            line2: None,
            city: String::new(),
            state: String::new(),
            pincode: String::new(),
            country: default_country(),
            is_default: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_with_defaults() {
        let address: Address = serde_json::from_value(serde_json::json!({
            "id": 5,
            "full_name": "A Sharma",
            "phone": "9000000000",
            "line1": "12 MG Road",
            "city": "Pune",
            "state": "MH",
            "pincode": "411001"
        }))
        .expect("parse");

        assert_eq!(address.country, "India");
        assert!(!address.is_default);
        assert_eq!(address.line2, None);
    }
}
