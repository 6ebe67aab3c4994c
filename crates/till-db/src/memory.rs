//! # In-Memory Stores
//!
//! Store implementations backed by `tokio::sync::RwLock`ed collections.
//! Same contracts as the SQLite repositories: compare-and-set stock,
//! one OPEN session per user, unique product codes and receipt numbers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use till_core::validation::validate_product;
use till_core::{CashSession, Money, Product, Sale, SessionStatus, StockMovement};

use crate::error::{DbError, DbResult};
use crate::store::{MovementStore, ProductCatalog, SaleStore, SessionStore};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<String, Product>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get(&self, code: &str) -> DbResult<Option<Product>> {
        Ok(self.products.read().await.get(code).cloned())
    }

    async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;

        let mut products = self.products.write().await;
        if products.contains_key(&product.code) {
            return Err(DbError::duplicate("products.code", &product.code));
        }
        products.insert(product.code.clone(), product.clone());
        Ok(())
    }

    async fn list(&self) -> DbResult<Vec<Product>> {
        let mut all: Vec<Product> = self.products.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        Ok(all)
    }

    async fn update_stock(&self, code: &str, expected: i64, new_stock: i64) -> DbResult<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(code)
            .ok_or_else(|| DbError::not_found("Product", code))?;

        if product.stock != expected {
            return Err(DbError::conflict("Product", code));
        }
        product.stock = new_stock;
        Ok(())
    }

    async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let mut low: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.stock <= threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.code.cmp(&b.code)));
        Ok(low)
    }

    async fn expiring_by(&self, date: NaiveDate) -> DbResult<Vec<Product>> {
        let mut expiring: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.expires_by(date))
            .cloned()
            .collect();
        expiring.sort_by(|a, b| a.expiry.cmp(&b.expiry).then_with(|| a.code.cmp(&b.code)));
        Ok(expiring)
    }
}

// =============================================================================
// Movements
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryMovementStore {
    rows: RwLock<Vec<StockMovement>>,
}

impl MemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MovementStore for MemoryMovementStore {
    async fn append(&self, movement: &StockMovement) -> DbResult<()> {
        self.rows.write().await.push(movement.clone());
        Ok(())
    }

    async fn recent(&self, product_code: Option<&str>, limit: u32) -> DbResult<Vec<StockMovement>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .rev()
            .filter(|m| product_code.map_or(true, |code| m.product_code == code))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Default)]
pub struct MemorySaleStore {
    rows: RwLock<Vec<Sale>>,
}

impl MemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sum_where<F>(&self, pred: F) -> Money
    where
        F: Fn(&Sale) -> bool + Send,
    {
        self.rows.read().await.iter().filter(|&s| pred(s)).map(|s| s.total).sum()
    }
}

#[async_trait]
impl SaleStore for MemorySaleStore {
    async fn insert(&self, sale: &Sale) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|s| s.id == sale.id) {
            return Err(DbError::duplicate("sales.id", &sale.id));
        }
        if rows.iter().any(|s| s.receipt_number == sale.receipt_number) {
            return Err(DbError::duplicate("sales.receipt_number", &sale.receipt_number));
        }
        rows.push(sale.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        Ok(self.rows.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp < to)
            .cloned()
            .collect();
        sales.sort_by_key(|s| s.timestamp);
        Ok(sales)
    }

    async fn total_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Money> {
        Ok(self
            .sum_where(|s| s.timestamp >= from && s.timestamp < to)
            .await)
    }

    async fn total_for_cashier_between(
        &self,
        cashier: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        Ok(self
            .sum_where(|s| s.cashier == cashier && s.timestamp >= from && s.timestamp < to)
            .await)
    }

    async fn total_for_cashier_since(&self, cashier: &str, since: DateTime<Utc>) -> DbResult<Money> {
        Ok(self
            .sum_where(|s| s.cashier == cashier && s.timestamp >= since)
            .await)
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    rows: RwLock<Vec<CashSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open_for(&self, user: &str) -> DbResult<Option<CashSession>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|s| s.user == user && s.is_open())
            .cloned())
    }

    async fn insert(&self, session: &CashSession) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if session.is_open() && rows.iter().any(|s| s.user == session.user && s.is_open()) {
            return Err(DbError::duplicate("cash_sessions.user", &session.user));
        }
        rows.push(session.clone());
        Ok(())
    }

    async fn close(
        &self,
        id: &str,
        closed_at: DateTime<Utc>,
        closing_amount: Money,
    ) -> DbResult<CashSession> {
        let mut rows = self.rows.write().await;
        let session = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DbError::not_found("CashSession", id))?;

        if !session.is_open() {
            return Err(DbError::conflict("CashSession", id));
        }

        session.status = SessionStatus::Closed;
        session.closed_at = Some(closed_at);
        session.closing_amount = Some(closing_amount);
        Ok(session.clone())
    }

    async fn history(&self, user: &str, limit: u32) -> DbResult<Vec<CashSession>> {
        let mut sessions: Vec<CashSession> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|s| s.user == user)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
