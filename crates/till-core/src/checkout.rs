//! # Checkout (pure pass)
//!
//! Everything about a checkout that can be decided without touching a
//! store: merging and validating the cart, pricing it, and resolving the
//! tender against the total.
//!
//! ## Staged Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  &[CartLine] ──► merge_lines ──► validate_cart ──► ValidatedCart        │
//! │                                      ▲               │                  │
//! │                     products under lock              │ resolve_tender   │
//! │                                                      ▼                  │
//! │                                               ResolvedTender            │
//! │                                                      │                  │
//! │                 (till-register: stock exits) ────────┤                  │
//! │                                                      ▼                  │
//! │                              ValidatedCart::into_sale ──► Sale          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `ValidatedCart` can only be built by [`validate_cart`], and is
//! consumed by [`ValidatedCart::into_sale`]. The caller applies the stock
//! exits in between, all or none.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DocType, PaymentMethod, Product, Sale, SaleLine, TaxRate, Tenders};
use crate::validation::{validate_amount, validate_cart_size, validate_product_code, validate_quantity};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

// =============================================================================
// Cart
// =============================================================================

/// A requested line: which product, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_code: String,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_code: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_code: product_code.into(),
            quantity,
        }
    }
}

/// Size limits applied to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_lines: usize,
    pub max_line_quantity: i64,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_lines: MAX_CART_LINES,
            max_line_quantity: MAX_LINE_QUANTITY,
        }
    }
}

/// Merges lines with the same product code, keeping first-seen order.
///
/// Quantities are summed as given; validation of the merged quantity
/// happens in [`validate_cart`].
///
/// ## Example
/// ```rust
/// use till_core::checkout::{merge_lines, CartLine};
///
/// let merged = merge_lines(&[
///     CartLine::new("A", 1),
///     CartLine::new("B", 2),
///     CartLine::new("A", 3),
/// ]).unwrap();
/// assert_eq!(merged, vec![CartLine::new("A", 4), CartLine::new("B", 2)]);
/// ```
pub fn merge_lines(lines: &[CartLine]) -> CoreResult<Vec<CartLine>> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        match index.get(line.product_code.as_str()) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(|| {
                    ValidationError::Overflow {
                        field: "quantity".to_string(),
                    }
                })?;
            }
            None => {
                index.insert(line.product_code.as_str(), merged.len());
                merged.push(line.clone());
            }
        }
    }

    Ok(merged)
}

/// A cart that passed validation against a stock snapshot, priced and
/// totalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCart {
    lines: Vec<SaleLine>,
    subtotal: Money,
    tax: Money,
    total: Money,
}

impl ValidatedCart {
    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Turns the cart into the committed sale record.
    pub fn into_sale(self, header: SaleHeader, tender: &ResolvedTender) -> Sale {
        Sale {
            id: header.id,
            receipt_number: header.receipt_number,
            doc_type: header.doc_type,
            timestamp: header.timestamp,
            lines: self.lines,
            tenders: tender.tenders,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            customer_ref: header.customer_ref,
            cashier: header.cashier,
            session_id: header.session_id,
        }
    }
}

/// Validates the whole cart before anything is mutated.
///
/// ## Steps
/// 1. Merge duplicate codes, reject an empty or oversized cart
/// 2. Per line: code format, `1 <= qty <= max_line_quantity`
/// 3. Per line: product exists in `products`, `qty <= stock`
/// 4. Price lines, sum the subtotal, tax it (HALF_UP), total
///
/// The first failing line decides the error; nothing is partially applied.
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use till_core::checkout::{validate_cart, CartLimits, CartLine};
/// use till_core::{Money, Product, TaxRate};
///
/// let bread = Product {
///     code: "1001".into(),
///     name: "Pan".into(),
///     category: "Panadería".into(),
///     unit_price: Money::from_units(2490),
///     stock: 10,
///     expiry: None,
/// };
/// let products = HashMap::from([(bread.code.clone(), bread)]);
///
/// let cart = validate_cart(
///     &[CartLine::new("1001", 2)],
///     &products,
///     CartLimits::default(),
///     TaxRate::from_bps(1900),
/// ).unwrap();
/// assert_eq!(cart.subtotal().units(), 4980);
/// assert_eq!(cart.tax().units(), 946);
/// assert_eq!(cart.total().units(), 5926);
/// ```
pub fn validate_cart(
    lines: &[CartLine],
    products: &HashMap<String, Product>,
    limits: CartLimits,
    rate: TaxRate,
) -> CoreResult<ValidatedCart> {
    let merged = merge_lines(lines)?;
    validate_cart_size(merged.len(), limits.max_lines)?;

    let mut priced = Vec::with_capacity(merged.len());
    let mut subtotal = Money::zero();

    for line in merged {
        validate_product_code(&line.product_code)?;
        validate_quantity(line.quantity, limits.max_line_quantity)?;

        let product = products
            .get(&line.product_code)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_code.clone()))?;

        if !product.can_supply(line.quantity) {
            return Err(CoreError::InsufficientStock {
                code: product.code.clone(),
                available: product.stock,
                requested: line.quantity,
            });
        }

        let line_total = product
            .unit_price
            .checked_mul_quantity(line.quantity)
            .ok_or_else(overflow)?;
        subtotal = subtotal.checked_add(line_total).ok_or_else(overflow)?;

        priced.push(SaleLine {
            product_code: product.code.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity: line.quantity,
        });
    }

    let tax = subtotal.calculate_tax(rate);
    let total = subtotal.checked_add(tax).ok_or_else(overflow)?;

    Ok(ValidatedCart {
        lines: priced,
        subtotal,
        tax,
        total,
    })
}

fn overflow() -> ValidationError {
    ValidationError::Overflow {
        field: "amount".to_string(),
    }
}

// =============================================================================
// Tender
// =============================================================================

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenderSelection {
    /// One instrument; `amount` is what was handed over.
    Single { method: PaymentMethod, amount: Money },
    /// Split across instruments; the parts must equal the total exactly.
    Mixed(Tenders),
}

/// A tender that settles a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTender {
    /// What is recorded on the sale; sums to the total.
    pub tenders: Tenders,
    /// What the customer handed over.
    pub tendered: Money,
    /// Cash returned to the customer.
    pub change: Money,
}

/// Resolves a tender selection against `total`.
///
/// ## Rules
/// ```text
/// Single(Cash, amount)     amount >= total   change = amount - total
/// Single(Card|Transfer)    amount >= total   recorded as exactly total
/// Mixed{cash,card,transfer} each >= 0        cash + card + transfer == total
/// ```
///
/// ## Errors
/// - [`CoreError::AmountMismatch`] when the tender does not settle the total
/// - [`ValidationError::MustNotBeNegative`] for a negative amount or part
pub fn resolve_tender(total: Money, selection: &TenderSelection) -> CoreResult<ResolvedTender> {
    match *selection {
        TenderSelection::Single { method, amount } => {
            validate_amount("tender amount", amount)?;
            if amount < total {
                return Err(CoreError::AmountMismatch {
                    total,
                    tendered: amount,
                });
            }

            let (tendered, change) = match method {
                PaymentMethod::Cash => (amount, amount - total),
                PaymentMethod::Card | PaymentMethod::Transfer => (total, Money::zero()),
            };

            Ok(ResolvedTender {
                tenders: Tenders::single(method, total),
                tendered,
                change,
            })
        }
        TenderSelection::Mixed(parts) => {
            validate_amount("cash", parts.cash)?;
            validate_amount("card", parts.card)?;
            validate_amount("transfer", parts.transfer)?;

            let sum = parts.checked_sum().ok_or_else(overflow)?;
            if sum != total {
                return Err(CoreError::AmountMismatch {
                    total,
                    tendered: sum,
                });
            }

            Ok(ResolvedTender {
                tenders: parts,
                tendered: sum,
                change: Money::zero(),
            })
        }
    }
}

// =============================================================================
// Sale Header / Receipt
// =============================================================================

/// Identity and context of a sale being committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleHeader {
    pub id: String,
    pub receipt_number: String,
    pub doc_type: DocType,
    pub timestamp: DateTime<Utc>,
    pub customer_ref: Option<String>,
    pub cashier: String,
    pub session_id: String,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub sale: Sale,
    pub tendered: Money,
    pub change: Money,
}

/// Formats a receipt number as `YYYYMMDD-NNNNNN`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use till_core::checkout::format_receipt_number;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
/// assert_eq!(format_receipt_number(day, 42), "20260314-000042");
/// ```
pub fn format_receipt_number(date: NaiveDate, sequence: u64) -> String {
    format!("{}-{:06}", date.format("%Y%m%d"), sequence)
}

/// Sequence part of a receipt number issued on `date`, if it is one.
///
/// ```rust
/// use chrono::NaiveDate;
/// use till_core::checkout::receipt_sequence;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
/// assert_eq!(receipt_sequence("20260314-000042", day), Some(42));
/// assert_eq!(receipt_sequence("20260313-000042", day), None);
/// ```
pub fn receipt_sequence(receipt_number: &str, date: NaiveDate) -> Option<u64> {
    let prefix = date.format("%Y%m%d").to_string();
    receipt_number
        .strip_prefix(prefix.as_str())?
        .strip_prefix('-')?
        .parse()
        .ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(code: &str, price: i64, stock: i64) -> Product {
        Product {
            code: code.to_string(),
            name: format!("Product {code}"),
            category: "General".to_string(),
            unit_price: Money::from_units(price),
            stock,
            expiry: None,
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<String, Product> {
        products.into_iter().map(|p| (p.code.clone(), p)).collect()
    }

    fn iva() -> TaxRate {
        TaxRate::from_bps(1900)
    }

    #[test]
    fn test_cash_sale_with_change() {
        let products = catalog(vec![product("A", 2490, 10)]);
        let cart = validate_cart(&[CartLine::new("A", 2)], &products, CartLimits::default(), iva())
            .unwrap();

        assert_eq!(cart.subtotal(), Money::from_units(4980));
        assert_eq!(cart.tax(), Money::from_units(946));
        assert_eq!(cart.total(), Money::from_units(5926));

        let tender = resolve_tender(
            cart.total(),
            &TenderSelection::Single {
                method: PaymentMethod::Cash,
                amount: Money::from_units(6000),
            },
        )
        .unwrap();
        assert_eq!(tender.change, Money::from_units(74));
        assert_eq!(tender.tendered, Money::from_units(6000));
        assert_eq!(tender.tenders.cash, Money::from_units(5926));
    }

    #[test]
    fn test_single_tender_short_is_mismatch() {
        let err = resolve_tender(
            Money::from_units(1000),
            &TenderSelection::Single {
                method: PaymentMethod::Cash,
                amount: Money::from_units(999),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::AmountMismatch { .. }));
    }

    #[test]
    fn test_card_overpayment_records_total_only() {
        let tender = resolve_tender(
            Money::from_units(1000),
            &TenderSelection::Single {
                method: PaymentMethod::Card,
                amount: Money::from_units(1200),
            },
        )
        .unwrap();
        assert_eq!(tender.tenders.card, Money::from_units(1000));
        assert!(tender.change.is_zero());
    }

    #[test]
    fn test_mixed_tender_must_match_exactly() {
        let total = Money::from_units(1000);
        let ok = resolve_tender(
            total,
            &TenderSelection::Mixed(Tenders {
                cash: Money::from_units(400),
                card: Money::from_units(600),
                transfer: Money::zero(),
            }),
        )
        .unwrap();
        assert_eq!(ok.tenders.checked_sum(), Some(total));

        let short = resolve_tender(
            total,
            &TenderSelection::Mixed(Tenders {
                cash: Money::from_units(400),
                card: Money::from_units(500),
                transfer: Money::zero(),
            }),
        );
        assert!(matches!(short, Err(CoreError::AmountMismatch { .. })));

        let over = resolve_tender(
            total,
            &TenderSelection::Mixed(Tenders {
                cash: Money::from_units(400),
                card: Money::from_units(700),
                transfer: Money::zero(),
            }),
        );
        assert!(matches!(over, Err(CoreError::AmountMismatch { .. })));
    }

    #[test]
    fn test_mixed_tender_rejects_negative_part() {
        let err = resolve_tender(
            Money::from_units(1000),
            &TenderSelection::Mixed(Tenders {
                cash: Money::from_units(1100),
                card: Money::from_units(-100),
                transfer: Money::zero(),
            }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = validate_cart(&[], &HashMap::new(), CartLimits::default(), iva()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyCart)));
    }

    #[test]
    fn test_unknown_product() {
        let err = validate_cart(
            &[CartLine::new("ZZZ", 1)],
            &HashMap::new(),
            CartLimits::default(),
            iva(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(code) if code == "ZZZ"));
    }

    #[test]
    fn test_insufficient_stock_after_merge() {
        let products = catalog(vec![product("A", 100, 3)]);
        let err = validate_cart(
            &[CartLine::new("A", 2), CartLine::new("A", 2)],
            &products,
            CartLimits::default(),
            iva(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 4, .. }
        ));
    }

    #[test]
    fn test_limits_enforced() {
        let products = catalog(vec![product("A", 100, 5000), product("B", 100, 5000)]);
        let limits = CartLimits {
            max_lines: 1,
            max_line_quantity: 10,
        };

        let too_many_lines = validate_cart(
            &[CartLine::new("A", 1), CartLine::new("B", 1)],
            &products,
            limits,
            iva(),
        );
        assert!(too_many_lines.is_err());

        let too_many_units = validate_cart(&[CartLine::new("A", 11)], &products, limits, iva());
        assert!(matches!(
            too_many_units,
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let zero = validate_cart(&[CartLine::new("A", 0)], &products, limits, iva());
        assert!(matches!(
            zero,
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
    }

    #[test]
    fn test_into_sale_freezes_lines() {
        let products = catalog(vec![product("A", 500, 4), product("B", 250, 9)]);
        let cart = validate_cart(
            &[CartLine::new("B", 2), CartLine::new("A", 1)],
            &products,
            CartLimits::default(),
            TaxRate::zero(),
        )
        .unwrap();

        let tender = resolve_tender(
            cart.total(),
            &TenderSelection::Single {
                method: PaymentMethod::Transfer,
                amount: cart.total(),
            },
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let sale = cart.into_sale(
            SaleHeader {
                id: "s-1".into(),
                receipt_number: format_receipt_number(day, 1),
                doc_type: DocType::Receipt,
                timestamp: day.and_hms_opt(10, 0, 0).unwrap().and_utc(),
                customer_ref: None,
                cashier: "ana".into(),
                session_id: "cs-1".into(),
            },
            &tender,
        );

        assert_eq!(sale.lines.len(), 2);
        assert_eq!(sale.lines[0].product_code, "B");
        assert_eq!(sale.total, Money::from_units(1000));
        assert_eq!(sale.tenders.transfer, Money::from_units(1000));
        assert_eq!(sale.receipt_number, "20260314-000001");
        assert_eq!(sale.item_count(), 3);
    }

    #[test]
    fn test_receipt_sequence_only_matches_its_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let number = format_receipt_number(day, 1_234_567);
        assert_eq!(receipt_sequence(&number, day), Some(1_234_567));

        assert_eq!(receipt_sequence("20260314-000007", day), Some(7));
        assert_eq!(receipt_sequence("20260315-000007", day), None);
        assert_eq!(receipt_sequence("20260314000007", day), None);
        assert_eq!(receipt_sequence("20260314-abc", day), None);
        assert_eq!(receipt_sequence("R-1", day), None);
    }
}
