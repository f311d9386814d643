//! Grouped Aggregation

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{AnalyticsError, Result};
use crate::model::{AggregateRow, MonthlyPoint, SalesRecord};

/// Rows whose operation name contains `operation`, ignoring case
pub fn filter_operation<'a>(records: &'a [SalesRecord], operation: &str) -> Vec<&'a SalesRecord> {
    let needle = operation.to_lowercase();
    records.iter().filter(|r| r.matches_operation(&needle)).collect()
}

/// Add one row's units to a running total
fn accumulate(total: &mut u64, units: u64) -> Result<()> {
    *total = total
        .checked_add(units)
        .ok_or_else(|| AnalyticsError::Dataset("units total overflows".into()))?;
    Ok(())
}

/// Sum units per (product id, product name) and keep the `n` best sellers.
///
/// Groups are visited in key order and sorted stably, so equal totals keep
/// that order.
pub fn top_products(rows: &[&SalesRecord], n: usize) -> Result<Vec<AggregateRow>> {
    let mut groups: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for row in rows {
        let total = groups
            .entry((row.product_id.as_str(), row.product_name.as_str()))
            .or_default();
        accumulate(total, row.units_sold)?;
    }

    let mut ranked: Vec<AggregateRow> = groups
        .into_iter()
        .map(|((id, name), units)| AggregateRow {
            product_id: id.to_string(),
            product_name: name.to_string(),
            units_sold: units,
        })
        .collect();

    ranked.sort_by(|a, b| b.units_sold.cmp(&a.units_sold));
    ranked.truncate(n);
    Ok(ranked)
}

/// Sum units per calendar month, dated on the 1st, in chronological order
pub fn monthly_series(rows: &[&SalesRecord]) -> Result<Vec<MonthlyPoint>> {
    let mut months: BTreeMap<(i32, u32), u64> = BTreeMap::new();
    for row in rows {
        accumulate(months.entry((row.calendar_year, row.calendar_month)).or_default(), row.units_sold)?;
    }

    months
        .into_iter()
        .map(|((year, month), units)| {
            NaiveDate::from_ymd_opt(year, month, 1)
                .map(|ds| MonthlyPoint { ds, units })
                .ok_or_else(|| AnalyticsError::Dataset(format!("invalid calendar month {year}-{month}")))
        })
        .collect()
}
