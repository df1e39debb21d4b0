//! # Validation Module
//!
//! Input validation utilities for Kirana POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (serde)                                         │
//! │  └── Shape and type of the JSON body                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules (lengths, phone format, password pairs)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (sku, barcode, phone, vendor code)             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_PAISA, MAX_SALE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty ("SKU is required.")
/// - At most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use kirana_core::validation::validate_sku;
///
/// assert!(validate_sku("NB-A4-200").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::rule("SKU is required."));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, customer, category, vendor).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a Nepal mobile number.
///
/// ## Rules
/// Optional `+977` / `977` prefix, then `9` followed by 8 or 9 digits.
///
/// ## Example
/// ```rust
/// use kirana_core::validation::validate_phone;
///
/// assert!(validate_phone("9841234567").is_ok());
/// assert!(validate_phone("+9779841234567").is_ok());
/// assert!(validate_phone("01-4412345").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone number".to_string(),
        });
    }

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let local = digits.strip_prefix("977").unwrap_or(digits);

    let valid = local.starts_with('9')
        && (9..=10).contains(&local.len())
        && local.chars().all(|c| c.is_ascii_digit());

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "phone number".to_string(),
            reason: "Enter valid Nepal mobile number (+977 format)".to_string(),
        });
    }

    Ok(())
}

/// Validates an e-mail address (shape only).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid e-mail address".to_string(),
        });
    }

    Ok(())
}

/// Validates a vendor code.
///
/// ## Rules
/// The code doubles as a subdomain label, so it must be 2-30 characters of
/// lowercase letters, digits or hyphens, not starting or ending with a hyphen.
pub fn validate_vendor_code(code: &str) -> ValidationResult<()> {
    if code.len() < 2 {
        return Err(ValidationError::TooShort {
            field: "vendor code".to_string(),
            min: 2,
        });
    }

    if code.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "vendor code".to_string(),
            max: 30,
        });
    }

    let valid = code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !code.starts_with('-')
        && !code.ends_with('-');

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "vendor code".to_string(),
            reason: "use lowercase letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a new password and its confirmation.
pub fn validate_password_pair(password: &str, confirm: &str) -> ValidationResult<()> {
    if password.is_empty() || password != confirm {
        return Err(ValidationError::rule("Passwords do not match."));
    }

    if password.chars().count() < 6 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in paisa. Zero is allowed (free items).
pub fn validate_price_paisa(field: &str, paisa: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_PAISA).contains(&paisa) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_PAISA,
        });
    }

    Ok(())
}

/// Validates a percentage given in basis points (0 to 100%).
pub fn validate_percentage_bps(field: &str, bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates the number of lines in a sale.
pub fn validate_sale_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "sale items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("NB-A4-200").is_ok());
        assert!(validate_sku("pen_blue").is_ok());

        let err = validate_sku("   ").unwrap_err();
        assert_eq!(err.to_string(), "SKU is required.");
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Gel Pen", 200).is_ok());
        assert!(validate_name("name", "", 200).is_err());
        assert!(validate_name("name", &"ा".repeat(20), 20).is_ok());
        assert!(validate_name("name", &"A".repeat(21), 20).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("9841234567").is_ok());
        assert!(validate_phone("984123456").is_ok());
        assert!(validate_phone("+9779841234567").is_ok());
        assert!(validate_phone("9779841234567").is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("8841234567").is_err());
        assert!(validate_phone("98412").is_err());
        assert!(validate_phone("98412345x7").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@shop.np").is_ok());
        assert!(validate_email("owner@shop").is_err());
        assert!(validate_email("@shop.np").is_err());
        assert!(validate_email("a b@shop.np").is_err());
    }

    #[test]
    fn test_validate_vendor_code() {
        assert!(validate_vendor_code("ktm-books").is_ok());
        assert!(validate_vendor_code("k").is_err());
        assert!(validate_vendor_code("KTM").is_err());
        assert!(validate_vendor_code("-ktm").is_err());
        assert!(validate_vendor_code("ktm.books").is_err());
    }

    #[test]
    fn test_validate_password_pair() {
        assert!(validate_password_pair("secret1", "secret1").is_ok());
        assert_eq!(
            validate_password_pair("secret1", "secret2")
                .unwrap_err()
                .to_string(),
            "Passwords do not match."
        );
        assert!(validate_password_pair("", "").is_err());
        assert!(validate_password_pair("abc", "abc").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_price_paisa("price", 0).is_ok());
        assert!(validate_price_paisa("price", -1).is_err());
        assert!(validate_price_paisa("price", MAX_PRICE_PAISA).is_ok());
        assert!(validate_price_paisa("price", MAX_PRICE_PAISA + 1).is_err());
        assert!(validate_percentage_bps("discount", 10_000).is_ok());
        assert!(validate_percentage_bps("discount", 10_001).is_err());
        assert!(validate_sale_size(100).is_ok());
        assert!(validate_sale_size(101).is_err());
    }
}
