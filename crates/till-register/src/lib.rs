//! # till-register: Register Services for Till POS
//!
//! The stateful half of the register. Everything that changes stock, opens
//! or closes a drawer, or commits a sale goes through this crate.
//!
//! ## Service Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Register                                      │
//! │                                                                         │
//! │   ┌──────────────────────────────────────────────────────────────────┐ │
//! │   │                      CheckoutEngine                              │ │
//! │   │   cart ──► validate ──► tender ──► exits ──► sale ──► receipt    │ │
//! │   └───────────┬──────────────────────────────────┬───────────────────┘ │
//! │               │ lock_user / get_open             │ lock_products /     │
//! │               ▼                                  ▼ record_locked       │
//! │   ┌───────────────────────┐          ┌───────────────────────┐         │
//! │   │  CashSessionManager   │          │     StockLedger       │         │
//! │   │  LockTable("user")    │          │  LockTable("product") │         │
//! │   └───────────┬───────────┘          └───────────┬───────────┘         │
//! │               │                                  │                     │
//! │               ▼                                  ▼                     │
//! │   SessionStore  SaleStore              ProductCatalog  MovementStore   │
//! │   └─────────── till-db: SQLite or in-memory, behind RetryPolicy ─────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock Order
//! A checkout takes the cashier's lock first, then its product locks in
//! sorted order. Session calls never take product locks and ledger calls
//! never take user locks, so no two tasks wait on each other in a cycle.
//!
//! ## Example
//! ```rust,no_run
//! use till_core::{CartLine, Money, PaymentMethod, TenderSelection};
//! use till_register::{CheckoutRequest, Register, RegisterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let register = Register::open(RegisterConfig::load(None)?).await?;
//!
//! register.sessions().open("ana", Money::from_units(20_000)).await?;
//! let receipt = register
//!     .checkout()
//!     .checkout(CheckoutRequest::new(
//!         "ana",
//!         vec![CartLine::new("7801234567890", 2)],
//!         TenderSelection::Single {
//!             method: PaymentMethod::Cash,
//!             amount: Money::from_units(10_000),
//!         },
//!     ))
//!     .await?;
//! println!("{} change {}", receipt.sale.receipt_number, receipt.change);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod report;
pub mod retry;
pub mod session;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutEngine, CheckoutPolicy, CheckoutRequest};
pub use config::{ConfigError, RegisterConfig};
pub use error::{ErrorCode, RegisterError, RegisterResult};
pub use ledger::{LoggingObserver, StockLedger, StockObserver, StockSnapshot};
pub use report::SalesSummary;
pub use retry::RetryPolicy;
pub use session::CashSessionManager;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use till_core::{Clock, Product, SystemClock};
use till_db::{Database, DbConfig, Stores};
use tracing::info;

// =============================================================================
// Register
// =============================================================================

/// One register: the three services sharing one set of stores.
pub struct Register {
    config: RegisterConfig,
    stores: Stores,
    database: Option<Database>,
    retry: RetryPolicy,
    ledger: Arc<StockLedger>,
    sessions: Arc<CashSessionManager>,
    checkout: CheckoutEngine,
}

impl std::fmt::Debug for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Register")
            .field("store", &self.config.store.name)
            .field("persistent", &self.database.is_some())
            .field("checkout", &self.checkout)
            .finish_non_exhaustive()
    }
}

impl Register {
    /// Opens the SQLite database named in the config, or in-memory stores
    /// when none is set.
    pub async fn open(config: RegisterConfig) -> RegisterResult<Self> {
        let Some(path) = config.store.database_path.clone() else {
            info!(store = %config.store.name, "Starting register on in-memory stores");
            return Ok(Self::new(Stores::in_memory(), config));
        };

        info!(store = %config.store.name, path = %path.display(), "Starting register on SQLite");
        let database = Database::new(DbConfig::new(path)).await?;
        let mut register = Self::new(database.stores(), config);
        register.database = Some(database);
        Ok(register)
    }

    pub fn new(stores: Stores, config: RegisterConfig) -> Self {
        Self::with_clock(stores, config, Arc::new(SystemClock))
    }

    /// Wires the services over `stores` with an explicit time source.
    pub fn with_clock(stores: Stores, config: RegisterConfig, clock: Arc<dyn Clock>) -> Self {
        let retry = config.retry.policy();

        let ledger = Arc::new(StockLedger::new(
            stores.catalog.clone(),
            stores.movements.clone(),
            retry.clone(),
            clock.clone(),
        ));
        let sessions = Arc::new(CashSessionManager::new(
            stores.sessions.clone(),
            stores.sales.clone(),
            retry.clone(),
            clock.clone(),
        ));
        let checkout = CheckoutEngine::new(
            ledger.clone(),
            sessions.clone(),
            stores.sales.clone(),
            CheckoutPolicy {
                tax_rate: config.checkout.tax_rate(),
                limits: config.checkout.limits(),
            },
            retry.clone(),
            clock,
        );

        Register {
            config,
            stores,
            database: None,
            retry,
            ledger,
            sessions,
            checkout,
        }
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn ledger(&self) -> &Arc<StockLedger> {
        &self.ledger
    }

    pub fn sessions(&self) -> &Arc<CashSessionManager> {
        &self.sessions
    }

    pub fn checkout(&self) -> &CheckoutEngine {
        &self.checkout
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Products at or below the configured low-stock threshold.
    pub async fn low_stock(&self) -> RegisterResult<Vec<Product>> {
        self.ledger
            .low_stock(self.config.inventory.low_stock_threshold)
            .await
    }

    /// Products expiring within the configured warning window.
    pub async fn expiring_soon(&self) -> RegisterResult<Vec<Product>> {
        self.ledger
            .expiring_within(self.config.inventory.expiry_warning_days)
            .await
    }

    /// Totals for the sales committed in `from <= timestamp < to`.
    pub async fn sales_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RegisterResult<SalesSummary> {
        let sales = self
            .retry
            .run("sales.list_between", || self.stores.sales.list_between(from, to))
            .await?;
        Ok(SalesSummary::from_sales(from, to, &sales))
    }

    /// Closes the database pool, if any.
    pub async fn shutdown(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            info!("Register database closed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::day_bounds;
    use crate::testing::{manual_clock, product, FlakySales};
    use till_db::MemorySaleStore;
    use till_core::{CartLine, Money, MovementKind, PaymentMethod, TenderSelection, Tenders};

    async fn register() -> Register {
        let register = Register::with_clock(
            Stores::in_memory(),
            RegisterConfig::default(),
            manual_clock(),
        );
        let bread = product("1001", 2490, 10);
        let mut milk = product("2001", 990, 3);
        milk.expiry = Some(manual_clock().today() + chrono::Duration::days(10));
        register.stores().catalog.insert(&bread).await.unwrap();
        register.stores().catalog.insert(&milk).await.unwrap();
        register
    }

    #[tokio::test]
    async fn test_open_without_database_uses_memory() {
        let register = Register::open(RegisterConfig::default()).await.unwrap();
        assert!(register.database.is_none());
        assert!(register.stores().catalog.list().await.unwrap().is_empty());
        register.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_day() {
        let register = register().await;
        let snapshot = Arc::new(StockSnapshot::new());
        register.ledger().subscribe(snapshot.clone());

        register
            .ledger()
            .record_entry("1001", 5, "Delivery", "bodega")
            .await
            .unwrap();

        let session = register
            .sessions()
            .open("ana", Money::from_units(20_000))
            .await
            .unwrap();

        let first = register
            .checkout()
            .checkout(CheckoutRequest::new(
                "ana",
                vec![CartLine::new("1001", 2)],
                TenderSelection::Single {
                    method: PaymentMethod::Cash,
                    amount: Money::from_units(6000),
                },
            ))
            .await
            .unwrap();
        assert_eq!(first.change, Money::from_units(74));

        let second = register
            .checkout()
            .checkout(CheckoutRequest::new(
                "ana",
                vec![CartLine::new("2001", 1), CartLine::new("1001", 1)],
                TenderSelection::Mixed(Tenders {
                    cash: Money::from_units(1000),
                    card: Money::from_units(3141),
                    transfer: Money::zero(),
                }),
            ))
            .await
            .unwrap();
        // 3480 + 661 (661.2 rounded)
        assert_eq!(second.sale.total, Money::from_units(4141));
        assert_eq!(second.sale.session_id, session.id);

        assert_eq!(snapshot.get("1001"), Some(12));
        assert_eq!(snapshot.get("2001"), Some(2));

        let exits = register.ledger().movements(Some("1001"), 10).await.unwrap();
        assert_eq!(exits.len(), 3);
        assert_eq!(exits[0].kind, MovementKind::Exit);
        assert_eq!(exits[2].kind, MovementKind::Entry);

        let low = register.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].code, "2001");

        let expiring = register.expiring_soon().await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].code, "2001");

        let (from, to) = day_bounds(manual_clock().today());
        let summary = register.sales_summary(from, to).await.unwrap();
        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.items_sold, 4);
        assert_eq!(summary.total, Money::from_units(5926 + 4141));
        assert_eq!(summary.card, Money::from_units(3141));

        let closure = register
            .sessions()
            .close("ana", Money::from_units(10_067))
            .await
            .unwrap();
        assert_eq!(closure.session.closing_amount, Some(Money::from_units(10_067)));
        assert!(closure.is_balanced());
    }

    #[tokio::test]
    async fn test_sales_summary_retries_transient_failures() {
        let sales = Arc::new(FlakySales::new(MemorySaleStore::new()));
        let stores = Stores {
            sales: sales.clone(),
            ..Stores::in_memory()
        };
        let mut config = RegisterConfig::default();
        config.retry.max_attempts = 3;
        config.retry.initial_backoff_ms = 1;
        config.retry.max_backoff_ms = 2;
        let register = Register::with_clock(stores, config, manual_clock());
        let (from, to) = day_bounds(manual_clock().today());

        sales.fail_next_listing(2);
        let summary = register.sales_summary(from, to).await.unwrap();
        assert_eq!(summary.sale_count, 0);

        sales.fail_next_listing(3);
        let err = register.sales_summary(from, to).await.unwrap_err();
        assert!(matches!(err, RegisterError::Io(_)));
    }
}
