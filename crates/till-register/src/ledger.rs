//! # Stock Ledger
//!
//! The only path through which product stock changes. Every change is
//! validated, applied with a compare-and-set write, and recorded as exactly
//! one immutable [`StockMovement`].
//!
//! ## Recording a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  record_exit("1001", 2, "SALE", "ana")                                  │
//! │       │                                                                 │
//! │       ├── validate code / qty / reason / user  ──► Validation           │
//! │       ▼                                                                 │
//! │  lock "1001"                                                            │
//! │       │                                                                 │
//! │       ├── catalog.get("1001")                  ──► NotFound             │
//! │       ├── kind.resulting_stock(prev, qty)      ──► InsufficientStock    │
//! │       ├── catalog.update_stock(prev → next)    ──► Conflict             │
//! │       ├── movements.append(movement)           ──► Io (stock restored)  │
//! │       ▼                                                                 │
//! │  unlock, notify observers, return movement                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store calls go through the [`RetryPolicy`]; reporting queries run
//! without taking any lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use till_core::validation::{validate_product_code, validate_user};
use till_core::{Clock, MovementKind, Product, StockMovement, ValidationError};
use till_db::{MovementStore, ProductCatalog};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{RegisterError, RegisterResult};
use crate::locks::{KeyGuard, LockTable};
use crate::retry::RetryPolicy;

const MAX_REASON_LEN: usize = 200;

// =============================================================================
// Observers
// =============================================================================

/// Notified after a movement has been applied and recorded.
///
/// Observers run synchronously on the recording task and must not block.
/// They are a refresh hook, not part of the ledger's correctness.
pub trait StockObserver: Send + Sync {
    fn on_stock_changed(&self, movement: &StockMovement);
}

/// Logs every movement at debug level.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl StockObserver for LoggingObserver {
    fn on_stock_changed(&self, movement: &StockMovement) {
        debug!(
            code = %movement.product_code,
            kind = %movement.kind,
            previous = movement.previous_stock,
            resulting = movement.resulting_stock,
            "Stock changed"
        );
    }
}

/// Keeps the latest known stock per product, for a UI that polls instead
/// of reloading the catalog.
#[derive(Debug, Default)]
pub struct StockSnapshot {
    levels: RwLock<HashMap<String, i64>>,
}

impl StockSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<i64> {
        self.levels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(code)
            .copied()
    }
}

impl StockObserver for StockSnapshot {
    fn on_stock_changed(&self, movement: &StockMovement) {
        self.levels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(movement.product_code.clone(), movement.resulting_stock);
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Validates and applies stock-affecting events.
pub struct StockLedger {
    catalog: Arc<dyn ProductCatalog>,
    movements: Arc<dyn MovementStore>,
    locks: LockTable,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    observers: RwLock<Vec<Arc<dyn StockObserver>>>,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("locks", &self.locks)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl StockLedger {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        movements: Arc<dyn MovementStore>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        StockLedger {
            catalog,
            movements,
            locks: LockTable::new("product"),
            retry,
            clock,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Registers an observer for every future movement.
    pub fn subscribe(&self, observer: Arc<dyn StockObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `qty > 0` units.
    pub async fn record_entry(
        &self,
        code: &str,
        qty: i64,
        reason: &str,
        who: &str,
    ) -> RegisterResult<StockMovement> {
        self.record(MovementKind::Entry, code, qty, reason, who).await
    }

    /// Removes `qty > 0` units. Never takes stock below zero.
    pub async fn record_exit(
        &self,
        code: &str,
        qty: i64,
        reason: &str,
        who: &str,
    ) -> RegisterResult<StockMovement> {
        self.record(MovementKind::Exit, code, qty, reason, who).await
    }

    /// Sets stock to `new_stock >= 0` regardless of its previous value.
    pub async fn record_adjustment(
        &self,
        code: &str,
        new_stock: i64,
        reason: &str,
        who: &str,
    ) -> RegisterResult<StockMovement> {
        self.record(MovementKind::Adjustment, code, new_stock, reason, who)
            .await
    }

    async fn record(
        &self,
        kind: MovementKind,
        code: &str,
        qty: i64,
        reason: &str,
        who: &str,
    ) -> RegisterResult<StockMovement> {
        validate_movement(kind, code, qty, reason, who)?;

        let guard = self.locks.lock(code).await;
        let movement = self.record_locked(kind, code, qty, reason, who).await?;
        drop(guard);

        self.notify(&movement);
        Ok(movement)
    }

    /// Applies one movement. The caller holds the lock for `code`.
    ///
    /// Observers are not notified; the caller does that once it has
    /// released its locks.
    pub(crate) async fn record_locked(
        &self,
        kind: MovementKind,
        code: &str,
        qty: i64,
        reason: &str,
        who: &str,
    ) -> RegisterResult<StockMovement> {
        let product = self
            .retry
            .run("catalog.get", || self.catalog.get(code))
            .await?
            .ok_or_else(|| RegisterError::not_found("Product", code))?;

        let previous = product.stock;
        let resulting = kind.resulting_stock(code, previous, qty)?;

        self.retry
            .run("catalog.update_stock", || {
                self.catalog.update_stock(code, previous, resulting)
            })
            .await?;

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            kind,
            product_code: code.to_string(),
            quantity: qty,
            previous_stock: previous,
            resulting_stock: resulting,
            reason: reason.to_string(),
            performed_by: who.to_string(),
            timestamp: self.clock.now(),
        };

        if let Err(e) = self
            .retry
            .run("movements.append", || self.movements.append(&movement))
            .await
        {
            // A stock change without its audit row is not allowed to stand.
            warn!(code, error = %e, "Movement append failed, restoring stock");
            if let Err(undo) = self
                .retry
                .run("catalog.update_stock", || {
                    self.catalog.update_stock(code, resulting, previous)
                })
                .await
            {
                error!(
                    code,
                    previous,
                    resulting,
                    error = %undo,
                    "Could not restore stock after failed append"
                );
            }
            return Err(e.into());
        }

        info!(
            code,
            kind = %kind,
            qty,
            previous,
            resulting,
            reason,
            who,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    pub(crate) fn notify(&self, movement: &StockMovement) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        for observer in observers.iter() {
            observer.on_stock_changed(movement);
        }
    }

    /// Locks every product in `codes` in sorted order.
    pub(crate) async fn lock_products<I, S>(&self, codes: I) -> Vec<KeyGuard>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.locks.lock_all(codes).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn product(&self, code: &str) -> RegisterResult<Option<Product>> {
        Ok(self
            .retry
            .run("catalog.get", || self.catalog.get(code))
            .await?)
    }

    /// Most recent movements first, optionally for one product.
    pub async fn movements(
        &self,
        code: Option<&str>,
        limit: u32,
    ) -> RegisterResult<Vec<StockMovement>> {
        Ok(self
            .retry
            .run("movements.recent", || self.movements.recent(code, limit))
            .await?)
    }

    /// Products with `stock <= threshold`, lowest first.
    pub async fn low_stock(&self, threshold: i64) -> RegisterResult<Vec<Product>> {
        Ok(self
            .retry
            .run("catalog.low_stock", || self.catalog.low_stock(threshold))
            .await?)
    }

    /// Products whose expiry date is on or before today + `days`.
    pub async fn expiring_within(&self, days: u32) -> RegisterResult<Vec<Product>> {
        let cutoff = self.clock.today() + Duration::days(i64::from(days));
        Ok(self
            .retry
            .run("catalog.expiring_by", || self.catalog.expiring_by(cutoff))
            .await?)
    }
}

/// Input checks that need no stock snapshot.
fn validate_movement(
    kind: MovementKind,
    code: &str,
    qty: i64,
    reason: &str,
    who: &str,
) -> Result<(), ValidationError> {
    validate_product_code(code)?;
    kind.check_quantity(qty)?;
    validate_user(who)?;

    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
