//! # Domain Types
//!
//! Core domain types used throughout Till POS.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  StockMovement  │   │   CashSession   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code (key)     │   │  kind           │   │  user           │       │
//! │  │  unit_price     │   │  previous_stock │   │  opening_float  │       │
//! │  │  stock (≥ 0)    │   │  resulting_stock│   │  status         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │    Tenders      │   │    TaxRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  lines (frozen) │   │  cash           │   │  bps (u32)      │       │
//! │  │  subtotal/tax   │   │  card           │   │  1900 = 19%     │       │
//! │  │  total          │   │  transfer       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `StockMovement` and `Sale` are immutable once created: nothing in the
//! workspace exposes a way to edit a stored row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1900 bps = 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `stock` is only ever changed through the stock ledger, which records a
/// [`StockMovement`] for every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Business key (barcode or internal code), unique in the catalog.
    pub code: String,

    /// Display name shown to the cashier and on the receipt.
    pub name: String,

    /// Free-form category ("Bebidas", "Lácteos", ...).
    pub category: String,

    /// Price per unit, never negative.
    pub unit_price: Money,

    /// Units on hand, never negative.
    pub stock: i64,

    /// Best-before date for perishables.
    pub expiry: Option<NaiveDate>,
}

impl Product {
    /// Checks whether `quantity` units can be taken from stock.
    #[inline]
    pub fn can_supply(&self, quantity: i64) -> bool {
        quantity <= self.stock
    }

    /// True when the product has an expiry date on or before `date`.
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= date)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// The kind of stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Goods received; `quantity` is added.
    Entry,
    /// Goods leaving (sale, shrinkage); `quantity` is removed.
    Exit,
    /// Physical count; `quantity` is the new absolute stock.
    Adjustment,
}

impl MovementKind {
    /// Computes the stock that results from applying this movement.
    ///
    /// Input is validated before anything else:
    /// - `Entry`/`Exit` require `quantity > 0`
    /// - `Adjustment` requires `quantity >= 0` (the new absolute stock)
    ///
    /// ## Errors
    /// - [`ValidationError::MustBePositive`] / [`ValidationError::MustNotBeNegative`]
    /// - [`ValidationError::Overflow`] when an entry would exceed `i64::MAX`
    /// - [`CoreError::InsufficientStock`] when an exit would go below zero
    ///
    /// ## Example
    /// ```rust
    /// use till_core::MovementKind;
    ///
    /// assert_eq!(MovementKind::Entry.resulting_stock("1001", 3, 2).unwrap(), 5);
    /// assert_eq!(MovementKind::Adjustment.resulting_stock("1001", 3, 10).unwrap(), 10);
    /// assert!(MovementKind::Exit.resulting_stock("1001", 3, 4).is_err());
    /// ```
    pub fn resulting_stock(&self, code: &str, previous: i64, quantity: i64) -> CoreResult<i64> {
        self.check_quantity(quantity)?;

        match self {
            MovementKind::Entry => previous.checked_add(quantity).ok_or_else(|| {
                ValidationError::Overflow {
                    field: "stock".to_string(),
                }
                .into()
            }),
            MovementKind::Exit => {
                if quantity > previous {
                    return Err(CoreError::InsufficientStock {
                        code: code.to_string(),
                        available: previous,
                        requested: quantity,
                    });
                }
                Ok(previous - quantity)
            }
            MovementKind::Adjustment => Ok(quantity),
        }
    }

    /// Input check that needs no stock snapshot.
    pub fn check_quantity(&self, quantity: i64) -> Result<(), ValidationError> {
        match self {
            MovementKind::Entry | MovementKind::Exit if quantity <= 0 => {
                Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                })
            }
            MovementKind::Adjustment if quantity < 0 => Err(ValidationError::MustNotBeNegative {
                field: "new stock".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementKind::Entry => write!(f, "ENTRY"),
            MovementKind::Exit => write!(f, "EXIT"),
            MovementKind::Adjustment => write!(f, "ADJUSTMENT"),
        }
    }
}

/// One immutable line of the stock ledger.
///
/// `previous_stock`/`resulting_stock` are the product's stock immediately
/// before and after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: String,
    pub kind: MovementKind,
    pub product_code: String,
    /// Units moved (ENTRY/EXIT) or the new absolute stock (ADJUSTMENT).
    pub quantity: i64,
    pub previous_stock: i64,
    pub resulting_stock: i64,
    pub reason: String,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change in stock (`resulting - previous`).
    #[inline]
    pub fn delta(&self) -> i64 {
        self.resulting_stock - self.previous_stock
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// Register session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// A cash-register session for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashSession {
    pub id: String,
    pub user: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Cash placed in the drawer at open.
    pub opening_float: Money,
    /// System-computed sales total since `opened_at`, set on close.
    pub closing_amount: Option<Money>,
    pub status: SessionStatus,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Outcome of closing a session.
///
/// `variance` is `declared_amount - closing_amount`; it is reported, never
/// enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClosure {
    pub session: CashSession,
    pub declared_amount: Money,
    pub variance: Money,
}

impl SessionClosure {
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.variance.is_zero()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Fiscal document emitted for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    /// Boleta.
    #[default]
    Receipt,
    /// Factura; usually carries a customer reference.
    Invoice,
}

/// A payment instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Transfer => write!(f, "transfer"),
        }
    }
}

/// Amount settled per instrument. For a committed sale the parts sum to
/// the sale total exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tenders {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
}

impl Tenders {
    /// The whole `amount` on a single instrument.
    pub fn single(method: PaymentMethod, amount: Money) -> Self {
        let mut tenders = Tenders::default();
        match method {
            PaymentMethod::Cash => tenders.cash = amount,
            PaymentMethod::Card => tenders.card = amount,
            PaymentMethod::Transfer => tenders.transfer = amount,
        }
        tenders
    }

    /// Sum of all instruments, `None` on overflow.
    pub fn checked_sum(&self) -> Option<Money> {
        self.cash.checked_add(self.card)?.checked_add(self.transfer)
    }
}

/// A sale line with product data frozen at the time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_code: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl SaleLine {
    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub doc_type: DocType,
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<SaleLine>,
    pub tenders: Tenders,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub customer_ref: Option<String>,
    pub cashier: String,
    /// The cash session the sale was rung up in.
    pub session_id: String,
}

impl Sale {
    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
