//! # Store Traits
//!
//! The persistence seams the register services are written against.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   till-register ──► Arc<dyn ProductCatalog>  ──┬──► MemoryCatalog       │
//! │                     Arc<dyn MovementStore>     │                        │
//! │                     Arc<dyn SaleStore>         └──► SQLite repositories │
//! │                     Arc<dyn SessionStore>                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations are expected to be individually atomic per call. They do
//! not lock across calls; that is the register's job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use till_core::{CashSession, Money, Product, Sale, StockMovement};

use crate::error::DbResult;

/// The product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks a product up by code.
    async fn get(&self, code: &str) -> DbResult<Option<Product>>;

    /// Registers a new product. Duplicate code → `DbError::UniqueViolation`.
    async fn insert(&self, product: &Product) -> DbResult<()>;

    /// All products ordered by name.
    async fn list(&self) -> DbResult<Vec<Product>>;

    /// Sets `stock = new_stock` only if it currently equals `expected`.
    ///
    /// ## Errors
    /// - `DbError::NotFound` if the code is unknown
    /// - `DbError::Conflict` if the stored stock differs from `expected`
    async fn update_stock(&self, code: &str, expected: i64, new_stock: i64) -> DbResult<()>;

    /// Products with `stock <= threshold`, ascending by stock.
    async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>>;

    /// Products with an expiry date on or before `date`, soonest first.
    async fn expiring_by(&self, date: NaiveDate) -> DbResult<Vec<Product>>;
}

/// The append-only stock movement log.
#[async_trait]
pub trait MovementStore: Send + Sync {
    async fn append(&self, movement: &StockMovement) -> DbResult<()>;

    /// Most recent movements first, optionally for a single product.
    async fn recent(&self, product_code: Option<&str>, limit: u32) -> DbResult<Vec<StockMovement>>;
}

/// Committed sales. Append-only.
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Persists a sale and its lines atomically.
    async fn insert(&self, sale: &Sale) -> DbResult<()>;

    async fn get(&self, id: &str) -> DbResult<Option<Sale>>;

    /// Sales with `from <= timestamp < to`, oldest first.
    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Sale>>;

    /// Sum of `total` for sales with `from <= timestamp < to`.
    async fn total_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Money>;

    /// Sum of `total` for one cashier's sales with `from <= timestamp < to`.
    async fn total_for_cashier_between(
        &self,
        cashier: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money>;

    /// Sum of `total` for one cashier's sales at or after `since`.
    async fn total_for_cashier_since(&self, cashier: &str, since: DateTime<Utc>) -> DbResult<Money>;
}

/// Cash-register sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The user's OPEN session, if any.
    async fn open_for(&self, user: &str) -> DbResult<Option<CashSession>>;

    /// Stores a new OPEN session. A second OPEN session for the same user
    /// → `DbError::UniqueViolation`.
    async fn insert(&self, session: &CashSession) -> DbResult<()>;

    /// Marks an OPEN session CLOSED and returns the stored row.
    ///
    /// ## Errors
    /// - `DbError::NotFound` for an unknown id
    /// - `DbError::Conflict` if the session is not OPEN anymore
    async fn close(
        &self,
        id: &str,
        closed_at: DateTime<Utc>,
        closing_amount: Money,
    ) -> DbResult<CashSession>;

    /// The user's sessions, most recently opened first.
    async fn history(&self, user: &str, limit: u32) -> DbResult<Vec<CashSession>>;
}

/// The four stores a register runs on.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn ProductCatalog>,
    pub movements: Arc<dyn MovementStore>,
    pub sales: Arc<dyn SaleStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        use crate::memory::{MemoryCatalog, MemoryMovementStore, MemorySaleStore, MemorySessionStore};

        Stores {
            catalog: Arc::new(MemoryCatalog::new()),
            movements: Arc::new(MemoryMovementStore::new()),
            sales: Arc::new(MemorySaleStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
