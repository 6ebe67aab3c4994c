//! # Sale Repository
//!
//! SQLite-backed [`SaleStore`].
//!
//! ## Schema
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales (1) ──────────────────────────< sale_lines (N)                   │
//! │  id, receipt_number (UNIQUE)            sale_id, line_no                │
//! │  subtotal, tax, total                   product_code, name (frozen)     │
//! │  tender_cash/card/transfer              unit_price (frozen), quantity   │
//! │  cashier, session_id                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale and its lines are written in one transaction; neither table is
//! ever updated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{decode_ts, encode_ts};
use crate::error::DbResult;
use crate::store::SaleStore;
use till_core::{Money, Sale, SaleLine, Tenders};

const SELECT_SALE: &str = r#"
    SELECT id, receipt_number, doc_type, timestamp, subtotal, tax, total,
           tender_cash, tender_card, tender_transfer, customer_ref, cashier, session_id
    FROM sales
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Header columns only; lines are attached by [`Self::with_lines`].
    fn from_row(row: &SqliteRow) -> DbResult<Sale> {
        let timestamp: String = row.try_get("timestamp")?;
        Ok(Sale {
            id: row.try_get("id")?,
            receipt_number: row.try_get("receipt_number")?,
            doc_type: row.try_get("doc_type")?,
            timestamp: decode_ts("sales.timestamp", &timestamp)?,
            lines: Vec::new(),
            tenders: Tenders {
                cash: Money::from_units(row.try_get("tender_cash")?),
                card: Money::from_units(row.try_get("tender_card")?),
                transfer: Money::from_units(row.try_get("tender_transfer")?),
            },
            subtotal: Money::from_units(row.try_get("subtotal")?),
            tax: Money::from_units(row.try_get("tax")?),
            total: Money::from_units(row.try_get("total")?),
            customer_ref: row.try_get("customer_ref")?,
            cashier: row.try_get("cashier")?,
            session_id: row.try_get("session_id")?,
        })
    }

    async fn with_lines(&self, mut sale: Sale) -> DbResult<Sale> {
        let rows = sqlx::query(
            r#"
            SELECT product_code, name, unit_price, quantity
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&sale.id)
        .fetch_all(&self.pool)
        .await?;

        sale.lines = rows
            .iter()
            .map(|row| -> DbResult<SaleLine> {
                Ok(SaleLine {
                    product_code: row.try_get("product_code")?,
                    name: row.try_get("name")?,
                    unit_price: Money::from_units(row.try_get("unit_price")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(sale)
    }

    async fn sum(&self, sql: &str, binds: &[String]) -> DbResult<Money> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for value in binds {
            query = query.bind(value);
        }
        Ok(Money::from_units(query.fetch_one(&self.pool).await?))
    }
}

#[async_trait]
impl SaleStore for SaleRepository {
    /// Inserts a sale and its lines in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - id or receipt number already used
    async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            lines = sale.lines.len(),
            "Inserting sale"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, doc_type, timestamp, subtotal, tax, total,
                tender_cash, tender_card, tender_transfer, customer_ref, cashier, session_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(sale.doc_type)
        .bind(encode_ts(&sale.timestamp))
        .bind(sale.subtotal.units())
        .bind(sale.tax.units())
        .bind(sale.total.units())
        .bind(sale.tenders.cash.units())
        .bind(sale.tenders.card.units())
        .bind(sale.tenders.transfer.units())
        .bind(&sale.customer_ref)
        .bind(&sale.cashier)
        .bind(&sale.session_id)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in sale.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (sale_id, line_no, product_code, name, unit_price, quantity)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&line.product_code)
            .bind(&line.name)
            .bind(line.unit_price.units())
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let row = sqlx::query(&format!("{SELECT_SALE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(Self::from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn list_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<Sale>> {
        let rows = sqlx::query(&format!(
            "{SELECT_SALE} WHERE timestamp >= ?1 AND timestamp < ?2 ORDER BY timestamp, id"
        ))
        .bind(encode_ts(&from))
        .bind(encode_ts(&to))
        .fetch_all(&self.pool)
        .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in &rows {
            sales.push(self.with_lines(Self::from_row(row)?).await?);
        }
        Ok(sales)
    }

    async fn total_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Money> {
        self.sum(
            "SELECT COALESCE(SUM(total), 0) FROM sales WHERE timestamp >= ?1 AND timestamp < ?2",
            &[encode_ts(&from), encode_ts(&to)],
        )
        .await
    }

    async fn total_for_cashier_between(
        &self,
        cashier: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Money> {
        self.sum(
            r#"
            SELECT COALESCE(SUM(total), 0) FROM sales
            WHERE cashier = ?1 AND timestamp >= ?2 AND timestamp < ?3
            "#,
            &[cashier.to_string(), encode_ts(&from), encode_ts(&to)],
        )
        .await
    }

    async fn total_for_cashier_since(&self, cashier: &str, since: DateTime<Utc>) -> DbResult<Money> {
        self.sum(
            "SELECT COALESCE(SUM(total), 0) FROM sales WHERE cashier = ?1 AND timestamp >= ?2",
            &[cashier.to_string(), encode_ts(&since)],
        )
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
