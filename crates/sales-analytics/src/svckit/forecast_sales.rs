//! Sales Forecast Tool
//!
//! Six-month monthly forecast with confidence intervals.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agent_core::{
    tool::{Arguments, ParamType, ParameterSchema},
    Result as CoreResult, Tool, ToolDefinition,
};

use super::{into_payload, FORECAST_SALES};
use crate::engine::SalesAnalytics;

/// Tool for forecasting monthly units sold
pub struct ForecastSalesTool {
    analytics: Arc<SalesAnalytics>,
}

impl ForecastSalesTool {
    pub fn new(analytics: Arc<SalesAnalytics>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl Tool for ForecastSalesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            FORECAST_SALES,
            "Forecast sales for the next 6 months using a trend and seasonality time series model. \
             Returns predicted values with confidence intervals. Can optionally filter results to show \
             forecasts starting from a specific date.",
        )
        .param(
            ParameterSchema::new(
                "operation",
                ParamType::String,
                "Operation name to filter by (e.g., 'Dallas', 'Charlotte')",
            )
            .required(),
        )
        .param(
            ParameterSchema::new(
                "include_history",
                ParamType::Boolean,
                "Whether to include historical data in the forecast results",
            )
            .with_default(json!(true)),
        )
        .param(ParameterSchema::new(
            "start_date",
            ParamType::String,
            "Optional start date to filter forecast results (YYYY-MM-DD format, e.g., '2025-10-01'). \
             Only forecasts from this date onwards will be returned.",
        ))
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let operation = args.str("operation").unwrap_or_default();
        let include_history = args.boolean("include_history").unwrap_or(true);
        let start_date = args.str("start_date");

        into_payload(
            self.analytics
                .forecast_sales(operation, include_history, start_date)
                .await,
            "forecast",
        )
    }
}
