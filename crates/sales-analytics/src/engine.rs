//! Analytics Engine
//!
//! The two tool operations over a [`SalesSource`]. The dataset is loaded
//! fresh on every call and never mutated, so one engine can be shared by any
//! number of concurrent callers.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::analysis::{
    filter_operation, horizon, monthly_series, top_products, AdditiveForecaster, Forecaster, HORIZON_MONTHS,
};
use crate::dataset::SalesSource;
use crate::error::{AnalyticsError, Result};
use crate::model::{ForecastPoint, ForecastReport, TopProducts};

pub struct SalesAnalytics {
    source: Arc<dyn SalesSource>,
    forecaster: Option<Arc<dyn Forecaster>>,
}

impl SalesAnalytics {
    /// Engine with the default additive forecaster
    pub fn new(source: Arc<dyn SalesSource>) -> Self {
        Self {
            source,
            forecaster: Some(Arc::new(AdditiveForecaster::default())),
        }
    }

    /// Disable forecasting; `forecast_sales` then reports `DependencyUnavailable`
    pub fn without_forecaster(mut self) -> Self {
        self.forecaster = None;
        self
    }

    /// Best-selling products for the operations matching `operation`
    pub async fn top_n_products(&self, n: i64, operation: &str) -> Result<TopProducts> {
        let top_n = usize::try_from(n)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or_else(|| AnalyticsError::InvalidArgument(format!("n must be at least 1, got {n}")))?;
        require_operation(operation)?;

        let records = self.source.load().await?;
        let rows = filter_operation(&records, operation);
        if rows.is_empty() {
            return Err(AnalyticsError::NotFound {
                operation: operation.to_string(),
            });
        }

        let products = top_products(&rows, top_n)?;
        tracing::debug!(operation, matched = rows.len(), returned = products.len(), "Top products computed");

        Ok(TopProducts {
            operation: operation.to_string(),
            top_n,
            products,
        })
    }

    /// Monthly forecast for the operations matching `operation`, six months past the last observation
    pub async fn forecast_sales(
        &self,
        operation: &str,
        include_history: bool,
        start_date: Option<&str>,
    ) -> Result<ForecastReport> {
        let forecaster = self.forecaster.as_ref().ok_or_else(|| {
            AnalyticsError::DependencyUnavailable("forecasting is disabled in this deployment".into())
        })?;
        require_operation(operation)?;

        let records = self.source.load().await?;
        let rows = filter_operation(&records, operation);
        if rows.is_empty() {
            return Err(AnalyticsError::NotFound {
                operation: operation.to_string(),
            });
        }

        let history = monthly_series(&rows)?;
        let last = history
            .last()
            .map(|p| p.ds)
            .ok_or_else(|| AnalyticsError::Dataset("no monthly observations".into()))?;

        let mut dates: Vec<NaiveDate> = if include_history {
            history.iter().map(|p| p.ds).collect()
        } else {
            Vec::new()
        };
        dates.extend(horizon(last, HORIZON_MONTHS));
        dates.sort_unstable();
        dates.dedup();

        let forecast = forecaster.forecast(&history, &dates)?;
        let (forecast, warning) = apply_start_date(forecast, start_date);

        tracing::debug!(
            operation,
            model = forecaster.name(),
            months = history.len(),
            points = forecast.len(),
            "Forecast computed"
        );

        Ok(ForecastReport {
            operation: operation.to_string(),
            include_history,
            start_date: start_date.map(str::to_string),
            forecast,
            warning,
        })
    }
}

fn require_operation(operation: &str) -> Result<()> {
    if operation.trim().is_empty() {
        return Err(AnalyticsError::InvalidArgument("operation must not be empty".into()));
    }
    Ok(())
}

/// Keep points dated on or after `start_date`.
///
/// A date that does not parse, or one that would drop every point, leaves the
/// forecast unfiltered and explains why in the returned warning.
fn apply_start_date(
    forecast: Vec<ForecastPoint>,
    start_date: Option<&str>,
) -> (Vec<ForecastPoint>, Option<String>) {
    let Some(raw) = start_date else {
        return (forecast, None);
    };

    let Ok(start) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
        tracing::warn!(start_date = raw, "Ignoring unparsable start_date");
        return (
            forecast,
            Some(format!("start_date '{raw}' is not a YYYY-MM-DD date; showing the unfiltered forecast")),
        );
    };

    if !forecast.iter().any(|p| p.ds >= start) {
        tracing::warn!(start_date = raw, "start_date is past the forecast horizon");
        return (
            forecast,
            Some(format!("start_date '{raw}' is after the last forecast month; showing the unfiltered forecast")),
        );
    }

    (forecast.into_iter().filter(|p| p.ds >= start).collect(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticSalesSource;
    use crate::model::SalesRecord;

    /// Dallas: Jan 2024 .. Dec 2024, Charlotte: Jul 2024 .. Mar 2025
    fn engine() -> SalesAnalytics {
        let mut records = Vec::new();
        for month in 1..=12 {
            records.push(SalesRecord::new("Dallas", "P1", "Widget", 100 + u64::from(month), 2024, month));
            records.push(SalesRecord::new("Dallas", "P2", "Gadget", 40, 2024, month));
        }
        for (year, month) in [(2024, 7), (2024, 8), (2024, 9), (2024, 10), (2024, 11), (2024, 12), (2025, 1), (2025, 2), (2025, 3)] {
            records.push(SalesRecord::new("Charlotte", "P3", "Gizmo", 60, year, month));
        }
        SalesAnalytics::new(Arc::new(StaticSalesSource::new(records)))
    }

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[tokio::test]
    async fn test_top_n_matches_case_insensitively() {
        let top = engine().top_n_products(5, "dallas").await.unwrap();
        assert_eq!(top.top_n, 5);
        assert_eq!(top.products.len(), 2);
        assert_eq!(top.products[0].product_id, "P1");
        assert!(top.products.windows(2).all(|w| w[0].units_sold >= w[1].units_sold));
    }

    #[tokio::test]
    async fn test_top_n_rejects_zero_and_reports_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.top_n_products(0, "Dallas").await,
            Err(AnalyticsError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.top_n_products(3, "NoSuchCity").await,
            Err(AnalyticsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_forecast_with_history_ends_six_months_out() {
        let report = engine().forecast_sales("Charlotte", true, None).await.unwrap();

        assert_eq!(report.forecast.len(), 9 + 6);
        assert_eq!(report.forecast.first().unwrap().ds, date(2024, 7));
        assert_eq!(report.forecast.last().unwrap().ds, date(2025, 9));
        assert!(report.warning.is_none());
    }

    #[tokio::test]
    async fn test_forecast_without_history_is_the_horizon() {
        let report = engine().forecast_sales("Dallas", false, None).await.unwrap();

        let dates: Vec<NaiveDate> = report.forecast.iter().map(|p| p.ds).collect();
        assert_eq!(dates, horizon(date(2024, 12), 6));
        for p in &report.forecast {
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
        }
    }

    #[tokio::test]
    async fn test_start_date_filters_or_warns() {
        let engine = engine();

        let filtered = engine.forecast_sales("Dallas", true, Some("2025-03-01")).await.unwrap();
        assert_eq!(filtered.forecast.len(), 4);
        assert_eq!(filtered.start_date.as_deref(), Some("2025-03-01"));

        let garbage = engine.forecast_sales("Dallas", true, Some("next spring")).await.unwrap();
        assert_eq!(garbage.forecast.len(), 12 + 6);
        assert!(garbage.warning.unwrap().contains("not a YYYY-MM-DD date"));

        let late = engine.forecast_sales("Dallas", false, Some("2030-01-01")).await.unwrap();
        assert_eq!(late.forecast.len(), 6);
        assert!(late.warning.is_some());
    }

    #[tokio::test]
    async fn test_forecast_disabled_is_dependency_unavailable() {
        let engine = engine().without_forecaster();
        assert!(matches!(
            engine.forecast_sales("Dallas", true, None).await,
            Err(AnalyticsError::DependencyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_forecast_not_found() {
        let err = engine().forecast_sales("NoSuchCity", true, None).await.unwrap_err();
        assert_eq!(err.to_string(), "No data found for operation: NoSuchCity");
    }
}
