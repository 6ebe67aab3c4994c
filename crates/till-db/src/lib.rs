//! # till-db: Persistence Layer for Till POS
//!
//! Store traits for the catalog, the stock movement log, sales and cash
//! sessions, with two implementations: in-memory and SQLite (sqlx).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Data Flow                               │
//! │                                                                         │
//! │  till-register (StockLedger, CheckoutEngine, CashSessionManager)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  store traits │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │◄───│  (SQLite)     │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ ProductCatalog│◄───│ Memory*       │    │ 001_init.sql │  │   │
//! │  │   │ MovementStore │    │ (memory.rs)   │    │              │  │   │
//! │  │   │ SaleStore     │    │               │    │              │  │   │
//! │  │   │ SessionStore  │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Store traits and the `Stores` bundle
//! - [`memory`] - In-memory store implementations
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - SQLite repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//! let stores = db.stores();
//! let product = stores.catalog.get("7801234567890").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{MovementStore, ProductCatalog, SaleStore, SessionStore, Stores};

pub use memory::{MemoryCatalog, MemoryMovementStore, MemorySaleStore, MemorySessionStore};
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::session::SessionRepository;
