//! Application configuration
//!
//! Values come from the environment (after `.env` is loaded); command-line
//! flags override them in the binaries.

use std::{fmt::Display, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};

use agent_core::{RpcSession, ToolServer};
use agent_runtime::StdioConnector;
use sales_analytics::{CsvSalesSource, SalesAnalytics};

pub const DEFAULT_DATA_PATH: &str = "data/sample_sales_data.csv";

/// File name of the tool server executable
pub const TOOL_SERVER_BIN: &str = "sales-tool-server";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Sales CSV read by the analytics engine
    pub data_path: PathBuf,

    /// Tool server executable; the sibling of the running binary when unset
    pub server_path: Option<PathBuf>,

    pub max_tool_rounds: usize,

    pub tool_timeout: Duration,

    pub model_timeout: Duration,

    /// When false, `forecast_sales` reports the forecaster as unavailable
    pub forecast_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            server_path: None,
            max_tool_rounds: 5,
            tool_timeout: Duration::from_secs(60),
            model_timeout: Duration::from_secs(120),
            forecast_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            data_path: lookup("SALES_DATA_PATH").map_or(defaults.data_path, PathBuf::from),
            server_path: lookup("MCP_SERVER_PATH").map(PathBuf::from),
            max_tool_rounds: parse_var(&lookup, "MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            tool_timeout: Duration::from_secs(parse_var(
                &lookup,
                "TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )?),
            model_timeout: Duration::from_secs(parse_var(
                &lookup,
                "MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )?),
            forecast_enabled: match lookup("FORECAST_ENABLED") {
                Some(raw) => parse_flag("FORECAST_ENABLED", &raw)?,
                None => defaults.forecast_enabled,
            },
        })
    }

    /// Analytics engine over the configured dataset
    pub fn analytics(&self) -> SalesAnalytics {
        let analytics = SalesAnalytics::new(Arc::new(CsvSalesSource::new(&self.data_path)));
        if self.forecast_enabled {
            analytics
        } else {
            analytics.without_forecaster()
        }
    }

    /// Tool server carrying the sales catalog
    pub fn tool_server(&self) -> Result<ToolServer> {
        let registry = sales_analytics::catalog(Arc::new(self.analytics()))?;
        Ok(ToolServer::new(registry, "sales-analytics", env!("CARGO_PKG_VERSION")))
    }

    /// Resolve the tool server executable
    pub fn server_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.server_path {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        Ok(exe.with_file_name(format!("{TOOL_SERVER_BIN}{}", std::env::consts::EXE_SUFFIX)))
    }

    /// Connector that launches the tool server with this configuration
    pub fn connector(&self) -> Result<StdioConnector> {
        Ok(StdioConnector::new(self.server_path()?)
            .env("SALES_DATA_PATH", self.data_path.display().to_string())
            .env("FORECAST_ENABLED", self.forecast_enabled.to_string()))
    }

    pub fn session(&self) -> Result<RpcSession> {
        Ok(RpcSession::new(Arc::new(self.connector()?)).with_invoke_timeout(self.tool_timeout))
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value '{raw}': {e}")),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid {key} value '{raw}': expected true or false"),
    }
}
