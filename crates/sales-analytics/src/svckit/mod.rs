//! Service Kit - Agent Tools
//!
//! The analytics operations as `agent_core::Tool`s.

mod forecast_sales;
mod top_products;

pub use forecast_sales::ForecastSalesTool;
pub use top_products::TopNProductsTool;

use serde_json::{Map, Value};

use agent_core::Result as CoreResult;

use crate::error::AnalyticsError;

pub const TOP_N_PRODUCTS: &str = "top_n_products";
pub const FORECAST_SALES: &str = "forecast_sales";

/// Map an engine outcome to a tool payload.
///
/// `NotFound` is data, not a fault: it becomes `{"error": .., <empty_key>: []}`
/// so callers always see the collection they asked for.
fn into_payload<T: serde::Serialize>(
    outcome: Result<T, AnalyticsError>,
    empty_key: &str,
) -> CoreResult<Value> {
    match outcome {
        Ok(report) => Ok(serde_json::to_value(report)?),
        Err(err @ AnalyticsError::NotFound { .. }) => {
            let mut payload = Map::new();
            payload.insert("error".into(), Value::String(err.to_string()));
            payload.insert(empty_key.into(), Value::Array(Vec::new()));
            Ok(Value::Object(payload))
        }
        Err(err) => Err(err.into()),
    }
}
