//! # Validation Module
//!
//! Input validation for the transaction engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web layer (external)                                         │
//! │  └── Format checks, immediate user feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  └── Quantity bounds, required shipping fields                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── CHECK / UNIQUE / FK constraints as the last line                  │
//! │                                                                         │
//! │  Defense in depth: each layer catches what the one above missed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::ShippingInfo;
use crate::{MAX_LINE_QUANTITY, MIN_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Quantity Validators
// =============================================================================

/// Validates a requested cart line quantity.
///
/// ## Rules
/// Quantity must be within `1..=100`. The upper bound is the per-order
/// ceiling; physical stock is checked separately against the ledger.
///
/// ## Example
/// ```rust
/// use atrium_core::validation::validate_line_quantity;
///
/// assert!(validate_line_quantity(1).is_ok());
/// assert!(validate_line_quantity(100).is_ok());
/// assert!(validate_line_quantity(0).is_err());
/// assert!(validate_line_quantity(101).is_err());
/// ```
pub fn validate_line_quantity(quantity: i64) -> ValidationResult<()> {
    if !(MIN_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: MIN_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Shipping Validators
// =============================================================================

/// Validates that every required shipping field is present.
///
/// Phone is optional; everything else is required. Returns the engine's
/// `InvalidShipping` error naming the first missing field so the caller
/// can correct the request.
pub fn validate_shipping(info: &ShippingInfo) -> CoreResult<()> {
    let required = [
        ("name", &info.name),
        ("address", &info.address),
        ("city", &info.city),
        ("postal_code", &info.postal_code),
        ("country", &info.country),
    ];

    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(CoreError::InvalidShipping {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "Ada Lovelace".to_string(),
            address: "12 Analytical Row".to_string(),
            city: "London".to_string(),
            postal_code: "N1 9GU".to_string(),
            country: "GB".to_string(),
            phone: None,
        }
    }

    #[test]
    fn quantity_bounds() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(50).is_ok());
        assert!(validate_line_quantity(100).is_ok());

        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-3).is_err());
        assert!(validate_line_quantity(101).is_err());
    }

    #[test]
    fn complete_shipping_passes() {
        assert!(validate_shipping(&shipping()).is_ok());
    }

    #[test]
    fn each_missing_field_is_named() {
        for field in ["name", "address", "city", "postal_code", "country"] {
            let mut info = shipping();
            match field {
                "name" => info.name = "  ".to_string(),
                "address" => info.address = String::new(),
                "city" => info.city = String::new(),
                "postal_code" => info.postal_code = String::new(),
                "country" => info.country = String::new(),
                _ => unreachable!(),
            }
            match validate_shipping(&info) {
                Err(CoreError::InvalidShipping { field: missing }) => assert_eq!(missing, field),
                other => panic!("expected InvalidShipping for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn phone_is_optional() {
        let mut info = shipping();
        info.phone = None;
        assert!(validate_shipping(&info).is_ok());
    }
}
