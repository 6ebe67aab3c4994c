//! Test fixtures: a fixed clock, sample products, and store wrappers that
//! fail on demand.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use till_core::{Clock, ManualClock, Money, Product, Sale, StockMovement};
use till_db::{
    DbError, DbResult, MemoryCatalog, MovementStore, ProductCatalog, SaleStore,
};

use crate::retry::RetryPolicy;

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
}

pub(crate) fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}

pub(crate) fn fixed_clock() -> Arc<dyn Clock> {
    manual_clock()
}

pub(crate) fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(2))
}

pub(crate) fn product(code: &str, price: i64, stock: i64) -> Product {
    Product {
        code: code.to_string(),
        name: format!("Producto {code}"),
        category: "Almacén".to_string(),
        unit_price: Money::from_units(price),
        stock,
        expiry: None,
    }
}

fn injected() -> DbError {
    DbError::ConnectionFailed("injected failure".to_string())
}

/// Counts down injected failures; true while one should be produced.
#[derive(Debug, Default)]
struct FailureBudget(AtomicU32);

impl FailureBudget {
    fn set(&self, n: u32) {
        self.0.store(n, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// =============================================================================
// Movement store
// =============================================================================

/// Fails the next `n` appends with a transient error.
pub(crate) struct FlakyMovements<S> {
    inner: S,
    failures: FailureBudget,
}

impl<S> FlakyMovements<S> {
    pub(crate) fn new(inner: S) -> Self {
        FlakyMovements {
            inner,
            failures: FailureBudget::default(),
        }
    }

    pub(crate) fn fail_next(&self, n: u32) {
        self.failures.set(n);
    }
}

#[async_trait]
impl<S: MovementStore> MovementStore for FlakyMovements<S> {
    async fn append(&self, movement: &StockMovement) -> DbResult<()> {
        if self.failures.take() {
            return Err(injected());
        }
        self.inner.append(movement).await
    }

    async fn recent(&self, product_code: Option<&str>, limit: u32) -> DbResult<Vec<StockMovement>> {
        self.inner.recent(product_code, limit).await
    }
}

// =============================================================================
// Sale store
// =============================================================================

/// Fails the next `n` inserts, or range listings, with a transient error.
pub(crate) struct FlakySales<S> {
    inner: S,
    failures: FailureBudget,
    listing_failures: FailureBudget,
}

impl<S> FlakySales<S> {
    pub(crate) fn new(inner: S) -> Self {
        FlakySales {
            inner,
            failures: FailureBudget::default(),
            listing_failures: FailureBudget::default(),
        }
    }

    pub(crate) fn fail_next(&self, n: u32) {
        self.failures.set(n);
    }

    pub(crate) fn fail_next_listing(&self, n: u32) {
        self.listing_failures.set(n);
    }
}

#[async_trait]
impl<S: SaleStore> SaleStore for FlakySales<S> {
    async fn insert(&self, sale: &Sale) -> DbResult<()> {
        if self.failures.take() {
            return Err(injected());
        }
        self.inner.insert(sale).await
    }

    async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        self.inner.get(id).await
    }

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        if self.listing_failures.take() {
            return Err(injected());
        }
        self.inner.list_between(from, to).await
    }

    async fn total_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Money> {
        self.inner.total_between(from, to).await
    }

    async fn total_for_cashier_between(
        &self,
        cashier: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        self.inner.total_for_cashier_between(cashier, from, to).await
    }

    async fn total_for_cashier_since(&self, cashier: &str, since: DateTime<Utc>) -> DbResult<Money> {
        self.inner.total_for_cashier_since(cashier, since).await
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Reports every stock write for one product code as a lost race.
pub(crate) struct ContendedCatalog {
    inner: MemoryCatalog,
    contended: Mutex<Option<String>>,
}

impl ContendedCatalog {
    pub(crate) fn new(inner: MemoryCatalog) -> Self {
        ContendedCatalog {
            inner,
            contended: Mutex::new(None),
        }
    }

    pub(crate) fn contend(&self, code: &str) {
        *self.contended.lock().unwrap() = Some(code.to_string());
    }
}

#[async_trait]
impl ProductCatalog for ContendedCatalog {
    async fn get(&self, code: &str) -> DbResult<Option<Product>> {
        self.inner.get(code).await
    }

    async fn insert(&self, product: &Product) -> DbResult<()> {
        self.inner.insert(product).await
    }

    async fn list(&self) -> DbResult<Vec<Product>> {
        self.inner.list().await
    }

    async fn update_stock(&self, code: &str, expected: i64, new_stock: i64) -> DbResult<()> {
        let contended = self.contended.lock().unwrap().as_deref() == Some(code);
        if contended {
            return Err(DbError::conflict("Product", code));
        }
        self.inner.update_stock(code, expected, new_stock).await
    }

    async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        self.inner.low_stock(threshold).await
    }

    async fn expiring_by(&self, date: NaiveDate) -> DbResult<Vec<Product>> {
        self.inner.expiring_by(date).await
    }
}
