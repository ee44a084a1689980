//! # Inventory Classification
//!
//! Stock-level classification and report shapes for the Inventory Report
//! Service. The service in torque-db reads the rows; everything here is
//! pure.
//!
//! ## Levels
//! ```text
//!   quantity ≤ 0                      → OUT_OF_STOCK  (≤ 0 covers backorders)
//!   0 < quantity ≤ reorder_level      → LOW_STOCK
//!   quantity > reorder_level          → IN_STOCK
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLevel {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockLevel {
    pub fn classify(quantity: i64, reorder_level: i64) -> StockLevel {
        if quantity <= 0 {
            StockLevel::OutOfStock
        } else if quantity <= reorder_level {
            StockLevel::LowStock
        } else {
            StockLevel::InStock
        }
    }
}

/// One product × store row of a stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReportRow {
    pub product_id: String,
    pub sku: String,
    pub product_name: String,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub store_id: String,
    pub store_name: String,
    /// 0 when the cell has never been stocked.
    pub quantity: i64,
    pub reorder_level: i64,
    pub level: StockLevel,
}

/// Which slice of the catalog a report covers. All filters are optional and
/// combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportFilter {
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
}

impl ReportFilter {
    pub fn category(id: impl Into<String>) -> Self {
        ReportFilter {
            category_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn product(id: impl Into<String>) -> Self {
        ReportFilter {
            product_id: Some(id.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    pub rows: i64,
    pub in_stock: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    /// Σ quantity over rows with positive stock.
    pub total_units: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryReport {
    pub rows: Vec<StockReportRow>,
    pub summary: InventorySummary,
}

impl InventoryReport {
    /// Builds a report and its summary from classified rows.
    pub fn from_rows(rows: Vec<StockReportRow>) -> Self {
        let mut summary = InventorySummary {
            rows: rows.len() as i64,
            ..Default::default()
        };
        for row in &rows {
            match row.level {
                StockLevel::InStock => summary.in_stock += 1,
                StockLevel::LowStock => summary.low_stock += 1,
                StockLevel::OutOfStock => summary.out_of_stock += 1,
            }
            summary.total_units += row.quantity.max(0);
        }
        InventoryReport { rows, summary }
    }

    /// Keeps only rows at the given level.
    pub fn only(self, level: StockLevel) -> Self {
        InventoryReport::from_rows(self.rows.into_iter().filter(|r| r.level == level).collect())
    }
}
