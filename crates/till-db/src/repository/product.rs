//! # Product Repository
//!
//! SQLite-backed [`ProductCatalog`].
//!
//! ## Stock Writes Are Compare-And-Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ Blind write (a second terminal's sale is silently lost)         │
//! │     UPDATE products SET stock = 3 WHERE code = ?                    │
//! │                                                                     │
//! │  ✅ Compare-and-set                                                 │
//! │     UPDATE products SET stock = 3 WHERE code = ? AND stock = 5      │
//! │     rows_affected = 0 → row changed under us → DbError::Conflict    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{decode_date, encode_date};
use crate::error::{DbError, DbResult};
use crate::store::ProductCatalog;
use till_core::validation::validate_product;
use till_core::{Money, Product};

const SELECT_PRODUCT: &str =
    "SELECT code, name, category, unit_price, stock, expiry FROM products";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
/// let product = repo.get("7801234567890").await?;
/// repo.update_stock("7801234567890", 5, 3).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    fn from_row(row: &SqliteRow) -> DbResult<Product> {
        let expiry: Option<String> = row.try_get("expiry")?;
        Ok(Product {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            unit_price: Money::from_units(row.try_get("unit_price")?),
            stock: row.try_get("stock")?,
            expiry: expiry.map(|raw| decode_date("products.expiry", &raw)).transpose()?,
        })
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn get(&self, code: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query(&format!("{SELECT_PRODUCT} WHERE code = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(())` - Inserted
    /// * `Err(DbError::UniqueViolation)` - Code already exists
    async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        debug!(code = %product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (code, name, category, unit_price, stock, expiry)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.unit_price.units())
        .bind(product.stock)
        .bind(product.expiry.as_ref().map(encode_date))
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.code.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    async fn list(&self) -> DbResult<Vec<Product>> {
        let rows = sqlx::query(&format!("{SELECT_PRODUCT} ORDER BY name, code"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn update_stock(&self, code: &str, expected: i64, new_stock: i64) -> DbResult<()> {
        debug!(code = %code, expected, new_stock, "Updating stock");

        let result = sqlx::query("UPDATE products SET stock = ?3 WHERE code = ?1 AND stock = ?2")
            .bind(code)
            .bind(expected)
            .bind(new_stock)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Tell "gone" apart from "changed"
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE code = ?1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

            return Err(match exists {
                Some(_) => DbError::conflict("Product", code),
                None => DbError::not_found("Product", code),
            });
        }

        Ok(())
    }

    async fn low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{SELECT_PRODUCT} WHERE stock <= ?1 ORDER BY stock, code"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn expiring_by(&self, date: NaiveDate) -> DbResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{SELECT_PRODUCT} WHERE expiry IS NOT NULL AND expiry <= ?1 ORDER BY expiry, code"
        ))
        .bind(encode_date(&date))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;

    fn product(code: &str, name: &str, stock: i64, expiry: Option<NaiveDate>) -> Product {
        Product {
            code: code.to_string(),
            name: name.to_string(),
            category: "Almacén".to_string(),
            unit_price: Money::from_units(1290),
            stock,
            expiry,
        }
    }

    #[tokio::test]
    async fn test_insert_get_and_duplicate() {
        let db = memory_db().await;
        let repo = db.products();
        let expiry = NaiveDate::from_ymd_opt(2026, 5, 1);

        repo.insert(&product("1001", "Leche", 12, expiry)).await.unwrap();
        let loaded = repo.get("1001").await.unwrap().unwrap();
        assert_eq!(loaded.expiry, expiry);
        assert_eq!(loaded.unit_price.units(), 1290);

        let err = repo.insert(&product("1001", "Otra", 1, None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "1001"));

        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_product() {
        let db = memory_db().await;
        let repo = db.products();

        let err = repo.insert(&product("1001", "", 5, None)).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));

        let err = repo.insert(&product("1001", "Leche", -1, None)).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));

        let mut negative_price = product("1001", "Leche", 5, None);
        negative_price.unit_price = Money::from_units(-50);
        let err = repo.insert(&negative_price).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));

        assert!(repo.get("1001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_stock_compare_and_set() {
        let db = memory_db().await;
        let repo = db.products();
        repo.insert(&product("1001", "Leche", 5, None)).await.unwrap();

        repo.update_stock("1001", 5, 2).await.unwrap();
        assert_eq!(repo.get("1001").await.unwrap().unwrap().stock, 2);

        let stale = repo.update_stock("1001", 5, 0).await.unwrap_err();
        assert!(matches!(stale, DbError::Conflict { .. }));

        let missing = repo.update_stock("9999", 0, 1).await.unwrap_err();
        assert!(matches!(missing, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reporting_queries() {
        let db = memory_db().await;
        let repo = db.products();
        let soon = NaiveDate::from_ymd_opt(2026, 3, 20);
        let later = NaiveDate::from_ymd_opt(2026, 9, 1);

        repo.insert(&product("A", "Yogurt", 3, soon)).await.unwrap();
        repo.insert(&product("B", "Arroz", 40, None)).await.unwrap();
        repo.insert(&product("C", "Queso", 1, later)).await.unwrap();

        let low: Vec<String> = repo.low_stock(5).await.unwrap().into_iter().map(|p| p.code).collect();
        assert_eq!(low, vec!["C", "A"]);

        let cutoff = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let expiring = repo.expiring_by(cutoff).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].code, "A");

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Arroz", "Queso", "Yogurt"]);
    }
}
