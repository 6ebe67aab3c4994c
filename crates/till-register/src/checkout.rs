//! # Checkout Engine
//!
//! Turns a cart and a tender into a committed sale, all or nothing.
//!
//! ## Staged Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CheckoutRequest                                                        │
//! │       │ merge lines, reject empty cart            (no locks)            │
//! │       ▼                                                                 │
//! │  lock cashier ──► OPEN session?                   ──► NoOpenSession     │
//! │       │                                                                 │
//! │  lock products (sorted) ──► snapshot                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_cart ──► ValidatedCart                  ──► NotFound /        │
//! │       │                                               InsufficientStock │
//! │  resolve_tender ──► ResolvedTender                ──► AmountMismatch    │
//! │       │                                                                 │
//! │  next receipt number (seeded from the store)      ──► Io                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EXIT per line via StockLedger ── failure ──► compensating ENTRY for    │
//! │       │                                        each applied exit,       │
//! │       ▼                                        then Conflict / Io       │
//! │  SaleStore.insert(sale) ────────── failure ──► same rollback, then Io   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  unlock ──► notify observers ──► Receipt                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything up to the first exit is read-only. Rollback records
//! `SALE_ROLLBACK` entries, so the ledger shows the failed attempt and every
//! stock change still has its movement.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use till_core::checkout::{
    format_receipt_number, merge_lines, receipt_sequence, resolve_tender, validate_cart,
};
use till_core::validation::{validate_cart_size, validate_user};
use till_core::{
    CartLimits, CartLine, Clock, DocType, MovementKind, Receipt, SaleHeader, StockMovement,
    TaxRate, TenderSelection, ValidationError, SALE_REASON, SALE_ROLLBACK_REASON,
};
use till_db::{DbError, SaleStore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RegisterError, RegisterResult};
use crate::ledger::StockLedger;
use crate::report::day_bounds;
use crate::retry::RetryPolicy;
use crate::session::CashSessionManager;

const MAX_CUSTOMER_REF_LEN: usize = 100;

// =============================================================================
// Request
// =============================================================================

/// What the cashier submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub cashier: String,
    pub lines: Vec<CartLine>,
    pub tender: TenderSelection,
    #[serde(default)]
    pub doc_type: DocType,
    /// Customer RUT or name, printed on invoices.
    #[serde(default)]
    pub customer_ref: Option<String>,
}

impl CheckoutRequest {
    pub fn new(cashier: impl Into<String>, lines: Vec<CartLine>, tender: TenderSelection) -> Self {
        CheckoutRequest {
            cashier: cashier.into(),
            lines,
            tender,
            doc_type: DocType::default(),
            customer_ref: None,
        }
    }

    pub fn doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn customer_ref(mut self, customer_ref: impl Into<String>) -> Self {
        self.customer_ref = Some(customer_ref.into());
        self
    }
}

/// Tax rate and limits for every checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPolicy {
    pub tax_rate: TaxRate,
    pub limits: CartLimits,
}

// =============================================================================
// Receipt numbers
// =============================================================================

/// Last receipt sequence issued today. Seeded from the highest sequence
/// already stored for the day, so numbers skipped by failed inserts are
/// never handed out again.
#[derive(Debug, Default)]
struct ReceiptCounter {
    day: Option<chrono::NaiveDate>,
    last: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Validates carts and commits sales through the stock ledger.
pub struct CheckoutEngine {
    ledger: Arc<StockLedger>,
    sessions: Arc<CashSessionManager>,
    sales: Arc<dyn SaleStore>,
    policy: CheckoutPolicy,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    receipts: Mutex<ReceiptCounter>,
}

impl std::fmt::Debug for CheckoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutEngine")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CheckoutEngine {
    pub fn new(
        ledger: Arc<StockLedger>,
        sessions: Arc<CashSessionManager>,
        sales: Arc<dyn SaleStore>,
        policy: CheckoutPolicy,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CheckoutEngine {
            ledger,
            sessions,
            sales,
            policy,
            retry,
            clock,
            receipts: Mutex::new(ReceiptCounter::default()),
        }
    }

    pub fn policy(&self) -> CheckoutPolicy {
        self.policy
    }

    /// Commits a sale.
    ///
    /// ## Errors
    /// - `Validation` - empty cart, bad quantity, blank cashier, cart limits
    /// - `NoOpenSession` - the cashier has no OPEN cash session
    /// - `NotFound` - a line names an unknown product
    /// - `InsufficientStock` - a line asks for more than is in stock
    /// - `AmountMismatch` - the tender does not settle the total
    /// - `Conflict` - stock moved underneath a commit; nothing was applied
    /// - `Io` - a store failed after retries; nothing was applied
    pub async fn checkout(&self, request: CheckoutRequest) -> RegisterResult<Receipt> {
        validate_user(&request.cashier)?;
        let customer_ref = normalize_customer_ref(request.customer_ref)?;

        let lines = merge_lines(&request.lines)?;
        validate_cart_size(lines.len(), self.policy.limits.max_lines)?;

        let cashier = request.cashier.as_str();
        let _cashier_guard = self.sessions.lock_user(cashier).await;
        let session = self
            .sessions
            .get_open(cashier)
            .await?
            .ok_or_else(|| RegisterError::NoOpenSession {
                user: cashier.to_string(),
            })?;

        let product_guards = self
            .ledger
            .lock_products(lines.iter().map(|l| l.product_code.as_str()))
            .await;

        let mut snapshot = HashMap::with_capacity(lines.len());
        for line in &lines {
            if let Some(product) = self.ledger.product(&line.product_code).await? {
                snapshot.insert(product.code.clone(), product);
            }
        }

        let cart = validate_cart(&lines, &snapshot, self.policy.limits, self.policy.tax_rate)?;
        let tender = resolve_tender(cart.total(), &request.tender)?;
        let receipt_number = self.next_receipt_number().await?;

        debug!(
            cashier,
            lines = cart.lines().len(),
            total = %cart.total(),
            "Cart validated, applying stock exits"
        );

        // ---------------------------------------------------------------------
        // Commit: stock exits, all or none
        // ---------------------------------------------------------------------
        let mut applied: Vec<StockMovement> = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let exit = self
                .ledger
                .record_locked(
                    MovementKind::Exit,
                    &line.product_code,
                    line.quantity,
                    SALE_REASON,
                    cashier,
                )
                .await;

            match exit {
                Ok(movement) => applied.push(movement),
                Err(e) => {
                    warn!(
                        cashier,
                        code = %line.product_code,
                        applied = applied.len(),
                        error = %e,
                        "Stock exit failed mid-commit, rolling back"
                    );
                    let compensations = self.roll_back(&applied, cashier).await;
                    drop(product_guards);
                    self.notify_all(&applied, &compensations);

                    return Err(match e {
                        RegisterError::InsufficientStock { code, .. }
                        | RegisterError::Conflict { id: code, .. } => {
                            RegisterError::conflict("Product", code)
                        }
                        other => other,
                    });
                }
            }
        }

        // ---------------------------------------------------------------------
        // Commit: the sale record
        // ---------------------------------------------------------------------
        let header = SaleHeader {
            id: Uuid::new_v4().to_string(),
            receipt_number,
            doc_type: request.doc_type,
            timestamp: self.clock.now(),
            customer_ref,
            cashier: cashier.to_string(),
            session_id: session.id.clone(),
        };
        let sale = cart.into_sale(header, &tender);

        if let Err(e) = self
            .retry
            .run("sales.insert", || self.sales.insert(&sale))
            .await
        {
            warn!(
                cashier,
                receipt = %sale.receipt_number,
                error = %e,
                "Sale insert failed, rolling back stock exits"
            );
            if is_receipt_collision(&e) {
                self.reset_receipt_counter().await;
            }
            let compensations = self.roll_back(&applied, cashier).await;
            drop(product_guards);
            self.notify_all(&applied, &compensations);
            return Err(e.into());
        }

        drop(product_guards);
        self.notify_all(&applied, &[]);

        info!(
            cashier,
            receipt = %sale.receipt_number,
            session_id = %sale.session_id,
            lines = sale.lines.len(),
            total = %sale.total,
            change = %tender.change,
            "Sale committed"
        );

        Ok(Receipt {
            sale,
            tendered: tender.tendered,
            change: tender.change,
        })
    }

    /// Reverses applied exits, newest first. Product locks are still held.
    async fn roll_back(&self, applied: &[StockMovement], cashier: &str) -> Vec<StockMovement> {
        let mut compensations = Vec::with_capacity(applied.len());

        for exit in applied.iter().rev() {
            match self
                .ledger
                .record_locked(
                    MovementKind::Entry,
                    &exit.product_code,
                    exit.quantity,
                    SALE_ROLLBACK_REASON,
                    cashier,
                )
                .await
            {
                Ok(entry) => compensations.push(entry),
                Err(e) => error!(
                    code = %exit.product_code,
                    qty = exit.quantity,
                    error = %e,
                    "Rollback entry failed, stock needs a manual adjustment"
                ),
            }
        }

        compensations
    }

    fn notify_all(&self, exits: &[StockMovement], entries: &[StockMovement]) {
        for movement in exits.iter().chain(entries) {
            self.ledger.notify(movement);
        }
    }

    async fn next_receipt_number(&self) -> RegisterResult<String> {
        let today = self.clock.today();
        let mut counter = self.receipts.lock().await;

        if counter.day != Some(today) {
            let (from, to) = day_bounds(today);
            let last = self
                .retry
                .run("sales.list_between", || self.sales.list_between(from, to))
                .await?
                .iter()
                .filter_map(|sale| receipt_sequence(&sale.receipt_number, today))
                .max()
                .unwrap_or(0);
            debug!(%today, last, "Receipt counter seeded");
            *counter = ReceiptCounter {
                day: Some(today),
                last,
            };
        }

        counter.last += 1;
        Ok(format_receipt_number(today, counter.last))
    }

    /// Forces a reseed from the store on the next checkout.
    async fn reset_receipt_counter(&self) {
        *self.receipts.lock().await = ReceiptCounter::default();
    }
}

fn is_receipt_collision(err: &DbError) -> bool {
    matches!(err, DbError::UniqueViolation { field, .. } if field.contains("receipt_number"))
}

fn normalize_customer_ref(customer_ref: Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = customer_ref else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_CUSTOMER_REF_LEN {
        return Err(ValidationError::TooLong {
            field: "customer_ref".to_string(),
            max: MAX_CUSTOMER_REF_LEN,
        });
    }

    Ok(Some(trimmed.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
