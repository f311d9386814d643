//! # sales-analytics
//!
//! Sales analytics engine exposed as agent tools.
//!
//! ## Tools
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────┐
//! │ top_n_products   │ n, operation                                     │
//! │                  │ → {operation, top_n, products[]}                 │
//! ├──────────────────┼──────────────────────────────────────────────────┤
//! │ forecast_sales   │ operation, include_history = true, start_date?   │
//! │                  │ → {operation, include_history, start_date,       │
//! │                  │    forecast[{ds, yhat, yhat_lower, yhat_upper}]} │
//! └──────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! An operation filter that matches nothing is answered with
//! `{"error": "No data found for operation: X", <collection>: []}`.

pub mod analysis;
pub mod annotate;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use annotate::ForecastAnnotator;
pub use dataset::{CsvSalesSource, SalesSource, StaticSalesSource};
pub use engine::SalesAnalytics;
pub use error::{AnalyticsError, Result};
pub use model::{AggregateRow, ForecastPoint, ForecastReport, SalesRecord, TopProducts};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{ForecastSalesTool, TopNProductsTool, FORECAST_SALES, TOP_N_PRODUCTS};
}

/// The tool catalog, in registration order: `top_n_products`, `forecast_sales`
pub fn catalog(analytics: Arc<SalesAnalytics>) -> agent_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(tools::TopNProductsTool::new(analytics.clone()))?;
    registry.register(tools::ForecastSalesTool::new(analytics))?;
    Ok(registry)
}

/// System prompt for the sales analytics agent
pub const ANALYTICS_PROMPT: &str = r"You are a sales analytics assistant for a multi-site distribution business.

## Data

Sales are recorded per operation (a site such as Dallas or Charlotte), per product and per calendar month.

## Tools

- `top_n_products` - best-selling products for an operation, by total units sold
- `forecast_sales` - monthly units forecast for the next 6 months, with an 80% confidence interval

## Guidelines

1. Use the tools for any question about sales figures; never invent numbers
2. Operation names match case-insensitively on any part of the name
3. Forecast dates are month starts; dates after today are predictions, not history
4. Present forecasts with their lower and upper bounds
5. If a tool reports that no data was found, say so and suggest a known operation";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order() {
        let source = Arc::new(StaticSalesSource::default());
        let registry = catalog(Arc::new(SalesAnalytics::new(source))).unwrap();
        assert_eq!(registry.names(), vec![tools::TOP_N_PRODUCTS, tools::FORECAST_SALES]);
        assert_eq!(
            registry.definition(tools::FORECAST_SALES).unwrap().required_names(),
            vec!["operation"]
        );
    }
}
