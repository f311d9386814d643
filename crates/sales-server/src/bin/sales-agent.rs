//! Sales Agent CLI
//!
//! Launches `sales-tool-server` as a child process and talks to it:
//! smoke test (default), interactive REPL, tools listing or a Gemini chat.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};

use agent_core::{AgentBuilder, LlmProvider, RpcSession, ToolTransport};
use agent_runtime::{GeminiConfig, GeminiProvider};
use sales_analytics::{ForecastAnnotator, ANALYTICS_PROMPT};
use sales_server::{commands, init_tracing, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "sales-agent", version, about = "Sales analytics agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Interactive mode (same as the `interactive` subcommand)
    #[arg(short, long)]
    interactive: bool,

    /// List tools and exit (same as the `list-tools` subcommand)
    #[arg(short, long = "list-tools")]
    list_tools: bool,

    /// Tool server executable (overrides MCP_SERVER_PATH)
    #[arg(long, global = true)]
    server: Option<PathBuf>,

    /// Sales CSV handed to the tool server (overrides SALES_DATA_PATH)
    #[arg(long, global = true)]
    data: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Run the fixed smoke-test calls
    Smoke,
    /// REPL: list, call <tool> <json>, quit
    Interactive,
    /// Print the tool catalog
    ListTools,
    /// Chat with Gemini using the sales tools
    Chat {
        /// Gemini model (overrides GEMINI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Maximum tool rounds per question (overrides MAX_TOOL_ROUNDS)
        #[arg(long)]
        max_tool_rounds: Option<usize>,
    },
}

impl Cli {
    fn resolved_command(&self) -> Command {
        match &self.command {
            Some(command) => command.clone(),
            None if self.interactive => Command::Interactive,
            None if self.list_tools => Command::ListTools,
            None => Command::Smoke,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    init_tracing("warn");

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(server) = cli.server.clone() {
        config.server_path = Some(server);
    }
    if let Some(data) = cli.data.clone() {
        config.data_path = data;
    }

    match cli.resolved_command() {
        Command::Chat { model, max_tool_rounds } => chat(config, model, max_tool_rounds).await,
        command => run_tools(&config, &command).await,
    }
}

async fn run_tools(config: &AppConfig, command: &Command) -> anyhow::Result<()> {
    let server = config.server_path()?;
    let mut session = config.session()?;
    session
        .connect()
        .await
        .with_context(|| format!("cannot start tool server {}", server.display()))?;

    if let Some(info) = session.server_info() {
        println!("Connected to {} {}", info.name, info.version);
    }

    let outcome = match command {
        Command::Interactive => commands::interactive(&session).await,
        Command::ListTools => commands::list_tools(&session, &mut std::io::stdout()),
        _ => commands::smoke(&session, &mut std::io::stdout()).await,
    };

    session.disconnect().await?;
    outcome
}

async fn chat(config: AppConfig, model: Option<String>, max_tool_rounds: Option<usize>) -> anyhow::Result<()> {
    let mut gemini = GeminiConfig::from_env()?;
    if let Some(model) = model {
        gemini.model = model;
    }
    let provider = Arc::new(GeminiProvider::from_config(gemini)?);

    if !provider.health_check().await.unwrap_or(false) {
        tracing::warn!("Gemini health check failed; requests may not succeed");
    }

    let session: RpcSession = config.session()?;
    let mut agent = AgentBuilder::new()
        .provider(provider.clone())
        .transport(session)
        .annotator(Arc::new(ForecastAnnotator::new()))
        .system_prompt(ANALYTICS_PROMPT)
        .model(provider.info().model)
        .max_tool_rounds(max_tool_rounds.unwrap_or(config.max_tool_rounds))
        .model_timeout(Some(config.model_timeout))
        .connect()
        .await?;

    let tools: Vec<String> = agent.tools()?.iter().map(|t| t.name.clone()).collect();
    println!("Connected. Tools: {}", tools.join(", "));

    let outcome = commands::chat(&mut agent).await;
    agent.disconnect().await?;
    outcome
}
