//! Sales Tool Server
//!
//! Serves `top_n_products` and `forecast_sales` as newline-delimited
//! JSON-RPC on stdin/stdout. Logs go to stderr.

use std::path::PathBuf;

use clap::Parser;

use sales_server::{init_tracing, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "sales-tool-server", version, about = "Sales analytics tool server (stdio)")]
struct Cli {
    /// Sales CSV (overrides SALES_DATA_PATH)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Serve without the forecaster (overrides FORECAST_ENABLED)
    #[arg(long)]
    no_forecast: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    init_tracing("info");

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if cli.no_forecast {
        config.forecast_enabled = false;
    }

    if !config.data_path.exists() {
        tracing::warn!(path = %config.data_path.display(), "Sales data file not found; tool calls will report it");
    }

    let server = config.tool_server()?;
    tracing::info!(
        data = %config.data_path.display(),
        forecast = config.forecast_enabled,
        "Starting {} {}",
        server.info().name,
        server.info().version
    );

    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
