//! # Sales Summary
//!
//! Period totals over committed sales. Reads only; runs outside every lock.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use till_core::{Money, Sale};

/// `[start of date, start of next date)` in UTC.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (from, from + Duration::days(1))
}

/// Totals for the sales in `from <= timestamp < to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub sale_count: usize,
    pub items_sold: i64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
}

impl SalesSummary {
    pub fn from_sales(from: DateTime<Utc>, to: DateTime<Utc>, sales: &[Sale]) -> Self {
        let mut summary = SalesSummary {
            from,
            to,
            sale_count: sales.len(),
            items_sold: 0,
            subtotal: Money::zero(),
            tax: Money::zero(),
            total: Money::zero(),
            cash: Money::zero(),
            card: Money::zero(),
            transfer: Money::zero(),
        };

        for sale in sales {
            summary.items_sold += sale.item_count();
            summary.subtotal += sale.subtotal;
            summary.tax += sale.tax;
            summary.total += sale.total;
            summary.cash += sale.tenders.cash;
            summary.card += sale.tenders.card;
            summary.transfer += sale.tenders.transfer;
        }

        summary
    }
}
