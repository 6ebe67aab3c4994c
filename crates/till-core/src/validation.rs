//! # Validation Module
//!
//! Input validation for Till POS.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                            │
//! │  ├── Codes, names, users: non-empty, bounded length                     │
//! │  └── Quantities, prices, amounts: sign and range                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: till-register services                                        │
//! │  └── Checks against current state (stock, open session)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (stock >= 0)                                                 │
//! │  └── UNIQUE / foreign key constraints                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_product_code, validate_quantity};
//!
//! validate_product_code("7801234567890").unwrap();
//! validate_quantity(5, 999).unwrap();
//! assert!(validate_quantity(0, 999).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Product;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;
const MAX_USER_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

fn require_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product code (barcode or internal code).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace or control characters
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_product_code;
///
/// assert!(validate_product_code("7801234567890").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("78 01").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    require_text("code", code, MAX_CODE_LEN)?;

    if code.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    require_text("name", name, MAX_NAME_LEN)
}

/// Validates the user recorded on movements, sessions and sales.
pub fn validate_user(user: &str) -> ValidationResult<()> {
    require_text("user", user, MAX_USER_LEN)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `max` (999 by default)
pub fn validate_quantity(qty: i64, max: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > max {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max,
        });
    }

    Ok(())
}

/// Validates a unit price. Zero is allowed.
///
/// ## Example
/// ```rust
/// use till_core::money::Money;
/// use till_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_units(990)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_units(-1)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    validate_amount("price", price)
}

/// Validates a non-negative monetary amount (float, declared cash, tender).
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a stock level (>= 0).
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of distinct lines).
///
/// ## Rules
/// - At least one line
/// - At most `max` lines
pub fn validate_cart_size(lines: usize, max: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::EmptyCart);
    }

    if lines > max {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a product before it is inserted into the catalog.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_code(&product.code)?;
    validate_product_name(&product.name)?;
    validate_price(product.unit_price)?;
    validate_stock(product.stock)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("7801234567890").is_ok());
        assert!(validate_product_code("PAN-KG").is_ok());

        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("   ").is_err());
        assert!(validate_product_code("has space").is_err());
        assert!(validate_product_code(&"9".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Leche Entera 1L").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1, 999).is_ok());
        assert!(validate_quantity(999, 999).is_ok());

        assert!(matches!(
            validate_quantity(0, 999),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity(-1, 999).is_err());
        assert!(matches!(
            validate_quantity(1000, 999),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_amounts_and_stock() {
        assert!(validate_amount("float", Money::zero()).is_ok());
        assert!(validate_amount("float", Money::from_units(-5)).is_err());
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(-1).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(matches!(
            validate_cart_size(0, 100),
            Err(ValidationError::EmptyCart)
        ));
        assert!(validate_cart_size(1, 100).is_ok());
        assert!(validate_cart_size(100, 100).is_ok());
        assert!(validate_cart_size(101, 100).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1900).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_product() {
        let mut product = Product {
            code: "1001".into(),
            name: "Pan".into(),
            category: "Panadería".into(),
            unit_price: Money::from_units(1500),
            stock: 10,
            expiry: None,
        };
        assert!(validate_product(&product).is_ok());

        product.stock = -2;
        assert!(validate_product(&product).is_err());
    }
}
