//! Top Products Tool
//!
//! Best-selling products for an operation, by total units sold.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{
    tool::{Arguments, ParamType, ParameterSchema},
    Result as CoreResult, Tool, ToolDefinition,
};

use super::{into_payload, TOP_N_PRODUCTS};
use crate::engine::SalesAnalytics;

/// Tool for ranking products by units sold
pub struct TopNProductsTool {
    analytics: Arc<SalesAnalytics>,
}

impl TopNProductsTool {
    pub fn new(analytics: Arc<SalesAnalytics>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl Tool for TopNProductsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            TOP_N_PRODUCTS,
            "Get top N products by units sold for a specific operation. Returns product ID, name, and total units sold.",
        )
        .param(ParameterSchema::new("n", ParamType::Integer, "Number of top products to return").required())
        .param(
            ParameterSchema::new(
                "operation",
                ParamType::String,
                "Operation name to filter by (e.g., 'Dallas', 'Charlotte')",
            )
            .required(),
        )
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        // Both are required, so binding guarantees them
        let n = args.integer("n").unwrap_or_default();
        let operation = args.str("operation").unwrap_or_default();

        into_payload(self.analytics.top_n_products(n, operation).await, "products")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticSalesSource;
    use crate::model::SalesRecord;
    use agent_core::{AgentError, ToolCall, ToolRegistry};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let source = StaticSalesSource::new(vec![
            SalesRecord::new("Dallas", "P1", "Widget", 12, 2024, 1),
            SalesRecord::new("Dallas", "P2", "Gadget", 30, 2024, 1),
            SalesRecord::new("Dallas", "P1", "Widget", 25, 2024, 2),
        ]);
        let analytics = Arc::new(SalesAnalytics::new(Arc::new(source)));
        let mut registry = ToolRegistry::new();
        registry.register(TopNProductsTool::new(analytics)).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_payload_shape() {
        let payload = registry()
            .execute(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 5, "operation": "dallas"})))
            .await
            .unwrap();

        assert_eq!(
            payload,
            json!({
                "operation": "dallas",
                "top_n": 5,
                "products": [
                    {"PRODUCT_ID": "P1", "PRODUCT_NAME": "Widget", "UNITS_SOLD": 37},
                    {"PRODUCT_ID": "P2", "PRODUCT_NAME": "Gadget", "UNITS_SOLD": 30},
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_not_found_is_data() {
        let payload = registry()
            .execute(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 3, "operation": "Atlantis"})))
            .await
            .unwrap();
        assert_eq!(payload["products"], json!([]));
        assert_eq!(payload["error"], "No data found for operation: Atlantis");
    }

    #[tokio::test]
    async fn test_zero_n_is_validation_error() {
        let err = registry()
            .execute(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 0, "operation": "Dallas"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }
}
