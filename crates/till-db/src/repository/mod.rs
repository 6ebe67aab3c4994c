//! # Repository Module
//!
//! SQLite implementations of the store traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  StockLedger / CheckoutEngine / CashSessionManager                      │
//! │       │                                                                 │
//! │       │  catalog.update_stock("7801234", 5, 3)                          │
//! │       ▼                                                                 │
//! │  ProductRepository (impl ProductCatalog)                                │
//! │  ├── get / insert / list                                                │
//! │  ├── update_stock  (compare-and-set)                                    │
//! │  └── low_stock / expiring_by                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - catalog and stock
//! - [`MovementRepository`](movement::MovementRepository) - stock movement log
//! - [`SaleRepository`](sale::SaleRepository) - sales and sale lines
//! - [`SessionRepository`](session::SessionRepository) - cash sessions

pub mod movement;
pub mod product;
pub mod sale;
pub mod session;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{DbError, DbResult};

/// Fixed-width UTC text, so that SQL string comparison is time order.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(field: &str, raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::decode(field, e))
}

pub(crate) fn encode_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(field: &str, raw: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| DbError::decode(field, e))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::pool::{Database, DbConfig};

    /// A migrated, private in-memory database.
    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_encoding_sorts_as_time() {
        let a = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(500);
        let c = a + chrono::Duration::seconds(1);

        let (ea, eb, ec) = (encode_ts(&a), encode_ts(&b), encode_ts(&c));
        assert_eq!(ea, "2026-03-14T09:00:00.000000Z");
        assert!(ea < eb && eb < ec);
        assert_eq!(decode_ts("t", &eb).unwrap(), b);
    }

    #[test]
    fn test_date_round_trip_and_bad_input() {
        let d = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        assert_eq!(decode_date("expiry", &encode_date(&d)).unwrap(), d);
        assert!(matches!(
            decode_date("expiry", "01/12/2026"),
            Err(DbError::Decode { .. })
        ));
    }
}
