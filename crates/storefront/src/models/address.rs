//! Shipping addresses.

use serde::{Deserialize, Serialize};

use bazaar_core::{AddressId, ContactError, Phone, UserId};

/// A user's shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    #[serde(skip)]
    pub user_id: UserId,
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub is_default: bool,
}

/// Address form / JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Why an [`AddressInput`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error(transparent)]
    Phone(#[from] ContactError),
}

const MAX_FIELD_LENGTH: usize = 200;

impl AddressInput {
    /// Trim fields, drop an empty `line2` and normalize the phone number.
    ///
    /// # Errors
    ///
    /// Returns the first missing or oversized field, or an invalid phone.
    pub fn normalize(mut self) -> Result<Self, AddressError> {
        for (field, value) in [
            ("name", &mut self.name),
            ("line1", &mut self.line1),
            ("city", &mut self.city),
            ("state", &mut self.state),
            ("postalCode", &mut self.postal_code),
            ("country", &mut self.country),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(AddressError::Missing(field));
            }
            if value.len() > MAX_FIELD_LENGTH {
                return Err(AddressError::TooLong {
                    field,
                    max: MAX_FIELD_LENGTH,
                });
            }
        }

        self.line2 = self
            .line2
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.phone = Phone::parse(&self.phone)?.into();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            name: " Asha Rao ".to_string(),
            line1: "12 MG Road".to_string(),
            line2: Some("   ".to_string()),
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
            phone: "+91 98765-43210".to_string(),
            is_default: false,
        }
    }

    #[test]
    fn test_normalize_trims_and_cleans_phone() {
        let address = input().normalize().expect("valid");
        assert_eq!(address.name, "Asha Rao");
        assert_eq!(address.line2, None);
        assert_eq!(address.phone, "+919876543210");
    }

    #[test]
    fn test_normalize_requires_fields() {
        let mut missing = input();
        missing.city = "  ".to_string();
        assert_eq!(missing.normalize(), Err(AddressError::Missing("city")));
    }

    #[test]
    fn test_normalize_rejects_bad_phone() {
        let mut bad = input();
        bad.phone = "call me".to_string();
        assert!(matches!(bad.normalize(), Err(AddressError::Phone(_))));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "name": "Asha", "line1": "1 Main", "city": "Pune", "state": "MH",
            "postalCode": "411001", "country": "IN", "phone": "9876543210",
            "isDefault": true
        }"#;
        let input: AddressInput = serde_json::from_str(json).expect("parse");
        assert_eq!(input.postal_code, "411001");
        assert!(input.is_default);
    }
}
