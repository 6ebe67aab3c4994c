//! # View DTOs
//!
//! Flat, camelCase shapes handed to the register UI. The domain types stay
//! free of presentation concerns; these are built with explicit `From`
//! mappers and exported to TypeScript with ts-rs.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::checkout::Receipt;
use crate::types::{DocType, Product};

/// A catalog row as the cashier sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit_price: i64,
    /// e.g. "$2.490"
    pub unit_price_display: String,
    pub stock: i64,
    /// ISO date (`YYYY-MM-DD`)
    pub expiry: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        ProductView {
            code: product.code.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            unit_price: product.unit_price.units(),
            unit_price_display: product.unit_price.to_string(),
            stock: product.stock,
            expiry: product.expiry.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLineView {
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTenderView {
    pub method: String,
    pub amount: i64,
}

/// A printable receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub receipt_number: String,
    /// "BOLETA" or "FACTURA"
    pub document: String,
    pub customer_ref: Option<String>,
    /// RFC 3339
    pub timestamp: String,
    pub cashier: String,
    pub lines: Vec<ReceiptLineView>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    /// Non-zero tenders only.
    pub tenders: Vec<ReceiptTenderView>,
    pub tendered: i64,
    pub change: i64,
}

impl From<&Receipt> for ReceiptView {
    fn from(receipt: &Receipt) -> Self {
        let sale = &receipt.sale;

        let tenders = [
            ("cash", sale.tenders.cash),
            ("card", sale.tenders.card),
            ("transfer", sale.tenders.transfer),
        ]
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(method, amount)| ReceiptTenderView {
            method: method.to_string(),
            amount: amount.units(),
        })
        .collect();

        ReceiptView {
            receipt_number: sale.receipt_number.clone(),
            document: match sale.doc_type {
                DocType::Receipt => "BOLETA".to_string(),
                DocType::Invoice => "FACTURA".to_string(),
            },
            customer_ref: sale.customer_ref.clone(),
            timestamp: sale.timestamp.to_rfc3339(),
            cashier: sale.cashier.clone(),
            lines: sale
                .lines
                .iter()
                .map(|l| ReceiptLineView {
                    code: l.product_code.clone(),
                    name: l.name.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price.units(),
                    line_total: l.line_total().units(),
                })
                .collect(),
            subtotal: sale.subtotal.units(),
            tax: sale.tax.units(),
            total: sale.total.units(),
            tenders,
            tendered: receipt.tendered.units(),
            change: receipt.change.units(),
        }
    }
}
