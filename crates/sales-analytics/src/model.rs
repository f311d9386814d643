//! Domain Models
//!
//! Dataset rows and the result shapes the tools return. Output field names
//! are part of the tool contract and must not change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the sales dataset. Extra columns are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "OPERATION_NAME")]
    pub operation_name: String,

    #[serde(rename = "PRODUCT_ID")]
    pub product_id: String,

    #[serde(rename = "PRODUCT_NAME")]
    pub product_name: String,

    #[serde(rename = "UNITS_SOLD")]
    pub units_sold: u64,

    #[serde(rename = "CALENDAR_YEAR")]
    pub calendar_year: i32,

    /// 1-12
    #[serde(rename = "CALENDAR_MONTH")]
    pub calendar_month: u32,
}

impl SalesRecord {
    pub fn new(
        operation_name: impl Into<String>,
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        units_sold: u64,
        calendar_year: i32,
        calendar_month: u32,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            product_id: product_id.into(),
            product_name: product_name.into(),
            units_sold,
            calendar_year,
            calendar_month,
        }
    }

    /// Case-insensitive substring match on the operation name
    pub fn matches_operation(&self, needle_lower: &str) -> bool {
        self.operation_name.to_lowercase().contains(needle_lower)
    }
}

/// Units sold per product, summed over the filtered rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    #[serde(rename = "PRODUCT_ID")]
    pub product_id: String,

    #[serde(rename = "PRODUCT_NAME")]
    pub product_name: String,

    #[serde(rename = "UNITS_SOLD")]
    pub units_sold: u64,
}

/// Units sold in one calendar month (dated on the 1st)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthlyPoint {
    pub ds: NaiveDate,
    pub units: u64,
}

/// One forecast row: `{ds: "YYYY-MM-DD", yhat, yhat_lower, yhat_upper}`
///
/// Invariant: `yhat_lower <= yhat <= yhat_upper`. Values are not clamped at
/// zero, so low-volume series may forecast negative units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: i64,
    pub yhat_lower: i64,
    pub yhat_upper: i64,
}

/// `top_n_products` result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProducts {
    pub operation: String,
    pub top_n: usize,
    pub products: Vec<AggregateRow>,
}

/// `forecast_sales` result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub operation: String,
    pub include_history: bool,
    pub start_date: Option<String>,
    pub forecast: Vec<ForecastPoint>,

    /// Set when a supplied `start_date` could not be applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
