//! Error Types for Sales Analytics

use std::path::PathBuf;

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// The operation filter matched no rows. Reported to callers as data.
    #[error("No data found for operation: {operation}")]
    NotFound { operation: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The forecasting model could not be constructed
    #[error("Forecasting model unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Not enough history to forecast: {found} monthly observation(s), need at least {needed}")]
    InsufficientHistory { found: usize, needed: usize },

    #[error("Data file not found: {}", .0.display())]
    DatasetMissing(PathBuf),

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AnalyticsError> for AgentError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidArgument(msg) => AgentError::ToolValidation(msg),
            other => AgentError::ToolExecution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = AnalyticsError::NotFound {
            operation: "Atlantis".into(),
        };
        assert_eq!(err.to_string(), "No data found for operation: Atlantis");
    }

    #[test]
    fn test_tool_boundary_conversion() {
        let invalid: AgentError = AnalyticsError::InvalidArgument("n must be at least 1".into()).into();
        assert!(matches!(invalid, AgentError::ToolValidation(_)));

        let missing: AgentError = AnalyticsError::DatasetMissing("data/x.csv".into()).into();
        assert_eq!(missing.to_string(), "Data file not found: data/x.csv");
    }
}
