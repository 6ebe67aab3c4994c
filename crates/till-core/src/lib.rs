//! # till-core: Pure Business Logic for Till POS
//!
//! This crate holds the rules of the register that do not need I/O:
//! money and tax arithmetic, the domain entities, input validation and the
//! pure half of checkout (cart validation, totals, tender resolution).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 till-register (services)                        │   │
//! │  │   StockLedger • CashSessionManager • CheckoutEngine             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ checkout  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ Validated │  │   rules   │  │   │
//! │  │   │  Movement │  │  TaxRate  │  │   Cart    │  │  checks   │  │   │
//! │  │   │   Sale    │  │           │  │  Tender   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Persistence)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockMovement, CashSession, Sale)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`checkout`] - Pure checkout pass: cart validation, totals, tenders
//! - [`clock`] - Injectable time source
//! - [`view`] - UI-boundary DTOs and their mappers
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//! use till_core::types::TaxRate;
//!
//! let subtotal = Money::from_units(4980);
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(1900)); // 19%
//!
//! // 4980 × 0.19 = 946.2 → 946 (HALF_UP)
//! assert_eq!(tax.units(), 946);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod clock;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;
pub mod view;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{
    CartLimits, CartLine, Receipt, ResolvedTender, SaleHeader, TenderSelection, ValidatedCart,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// Guards against typing 1000 instead of 10 at the register.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Default tax rate in basis points (19% IVA).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1900;

/// Reason recorded on stock exits produced by a committed sale.
pub const SALE_REASON: &str = "SALE";

/// Reason recorded on compensating entries when a checkout is rolled back.
pub const SALE_ROLLBACK_REASON: &str = "SALE_ROLLBACK";
