//! Analysis
//!
//! Pure computations over loaded rows: grouping and forecasting.

pub mod aggregate;
pub mod forecast;

pub use aggregate::{filter_operation, monthly_series, top_products};
pub use forecast::{horizon, AdditiveForecaster, Forecaster, HORIZON_MONTHS};
