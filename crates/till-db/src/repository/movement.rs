//! # Movement Repository
//!
//! SQLite-backed [`MovementStore`]. Rows are only ever inserted.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{decode_ts, encode_ts};
use crate::error::DbResult;
use crate::store::MovementStore;
use till_core::StockMovement;

#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    fn from_row(row: &SqliteRow) -> DbResult<StockMovement> {
        let timestamp: String = row.try_get("timestamp")?;
        Ok(StockMovement {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            product_code: row.try_get("product_code")?,
            quantity: row.try_get("quantity")?,
            previous_stock: row.try_get("previous_stock")?,
            resulting_stock: row.try_get("resulting_stock")?,
            reason: row.try_get("reason")?,
            performed_by: row.try_get("performed_by")?,
            timestamp: decode_ts("stock_movements.timestamp", &timestamp)?,
        })
    }
}

#[async_trait]
impl MovementStore for MovementRepository {
    async fn append(&self, movement: &StockMovement) -> DbResult<()> {
        debug!(
            id = %movement.id,
            kind = %movement.kind,
            code = %movement.product_code,
            "Appending stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, kind, product_code, quantity,
                previous_stock, resulting_stock, reason, performed_by, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(movement.kind)
        .bind(&movement.product_code)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.resulting_stock)
        .bind(&movement.reason)
        .bind(&movement.performed_by)
        .bind(encode_ts(&movement.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, product_code: Option<&str>, limit: u32) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, product_code, quantity, previous_stock,
                   resulting_stock, reason, performed_by, timestamp
            FROM stock_movements
            WHERE ?1 IS NULL OR product_code = ?1
            ORDER BY seq DESC
            LIMIT ?2
            "#,
        )
        .bind(product_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}
