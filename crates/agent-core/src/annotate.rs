//! Tool result annotation
//!
//! Wraps an invocation result into the text of a `tool-result` turn. The
//! orchestrator calls this once per invocation, success or failure.

use crate::tool::ToolResult;

/// Renders a tool result as context for the next model call
pub trait ResultAnnotator: Send + Sync {
    fn annotate(&self, tool: &str, result: &ToolResult) -> String;
}

/// Restates the tool name and the raw payload
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainAnnotator;

impl PlainAnnotator {
    pub fn success(tool: &str, payload_text: &str) -> String {
        format!("Here is the data from the {tool} function:\n\n{payload_text}\n\nPlease format this nicely for the user.")
    }

    pub fn failure(tool: &str, message: &str) -> String {
        format!("Error calling function {tool}: {message}")
    }
}

impl ResultAnnotator for PlainAnnotator {
    fn annotate(&self, tool: &str, result: &ToolResult) -> String {
        match result {
            ToolResult::Ok(_) => Self::success(tool, &result.to_text()),
            ToolResult::Err(message) => Self::failure(tool, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_annotation() {
        let ok = PlainAnnotator.annotate("top_n_products", &ToolResult::Ok(json!({"top_n": 5})));
        assert!(ok.starts_with("Here is the data from the top_n_products function:"));
        assert!(ok.contains("\"top_n\": 5"));

        let err = PlainAnnotator.annotate("forecast_sales", &ToolResult::failure("boom"));
        assert_eq!(err, "Error calling function forecast_sales: boom");
    }
}
