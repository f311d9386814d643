//! End-to-end tests: sales catalog behind a tool server, reached through a
//! session, driven by a scripted model.

use std::{
    collections::VecDeque,
    io::Write,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use agent_core::{
    provider::ProviderInfo, AgentBuilder, AgentError, Completion, FunctionDeclaration, GenerationOptions,
    InProcessConnector, JsonSchemaTranslator, LlmProvider, Message, Result as CoreResult, Role, RpcSession,
    SchemaTranslator, ToolCall, ToolResult, ToolServer, ToolTransport,
};
use agent_runtime::StdioConnector;
use sales_analytics::{
    tools::{FORECAST_SALES, TOP_N_PRODUCTS},
    ForecastAnnotator,
};
use sales_server::{
    commands::{self, ReplStep},
    AppConfig,
};

/// Dallas: 6 products over 2024-01..2024-12. Charlotte: 2 products over 2024-07..2025-03.
fn fixture() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "OPERATION_NAME,PRODUCT_ID,PRODUCT_NAME,UNITS_SOLD,CALENDAR_YEAR,CALENDAR_MONTH").unwrap();
    for month in 1..=12 {
        for k in 1..=6 {
            writeln!(file, "Dallas,P{k},Product {k},{},2024,{month}", 10 * k + month).unwrap();
        }
    }
    for (year, month) in (7..=12).map(|m| (2024, m)).chain((1..=3).map(|m| (2025, m))) {
        writeln!(file, "Charlotte,P1,Product 1,{},{year},{month}", 40 + month).unwrap();
        writeln!(file, "Charlotte,P7,Product 7,{},{year},{month}", 25 + 2 * month).unwrap();
    }
    file.flush().unwrap();
    file
}

fn config(data: &NamedTempFile) -> AppConfig {
    AppConfig {
        data_path: data.path().to_path_buf(),
        ..AppConfig::default()
    }
}

fn server(config: &AppConfig) -> Arc<ToolServer> {
    Arc::new(config.tool_server().unwrap())
}

async fn connected(config: &AppConfig) -> RpcSession {
    let mut session = RpcSession::new(Arc::new(InProcessConnector::new(server(config))));
    session.connect().await.unwrap();
    session
}

#[tokio::test]
async fn test_catalog_listing_is_stable() {
    let data = fixture();
    let session = connected(&config(&data)).await;

    let first = session.list_tools().await.unwrap();
    let second = session.list_tools().await.unwrap();
    let names: Vec<&str> = first.iter().map(|t| t.name.as_str()).collect();

    assert_eq!(names, [TOP_N_PRODUCTS, FORECAST_SALES]);
    assert_eq!(first, second);
    assert_eq!(session.server_info().unwrap().name, "sales-analytics");
}

#[tokio::test]
async fn test_top_five_dallas_case_insensitive() {
    let data = fixture();
    let session = connected(&config(&data)).await;

    let result = session
        .invoke(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 5, "operation": "dallas"})))
        .await
        .unwrap();
    let payload = result.payload().unwrap();
    let products = payload["products"].as_array().unwrap();

    assert_eq!(products.len(), 5);
    let ids: Vec<&str> = products.iter().map(|p| p["PRODUCT_ID"].as_str().unwrap()).collect();
    assert_eq!(ids, ["P6", "P5", "P4", "P3", "P2"]);
    let units: Vec<u64> = products.iter().map(|p| p["UNITS_SOLD"].as_u64().unwrap()).collect();
    assert!(units.windows(2).all(|w| w[0] >= w[1]));
    // 12 months of 10*6 + month
    assert_eq!(units[0], 720 + 78);
}

#[tokio::test]
async fn test_charlotte_forecast_runs_six_months_past_history() {
    let data = fixture();
    let session = connected(&config(&data)).await;

    let result = session
        .invoke(&ToolCall::from_json(
            FORECAST_SALES,
            json!({"operation": "Charlotte", "include_history": true}),
        ))
        .await
        .unwrap();
    let forecast = result.payload().unwrap()["forecast"].as_array().unwrap().clone();

    assert_eq!(forecast.len(), 9 + 6);
    assert_eq!(forecast[0]["ds"], "2024-07-01");
    assert_eq!(forecast.last().unwrap()["ds"], "2025-09-01");
    for point in &forecast {
        let (lo, mid, hi) = (
            point["yhat_lower"].as_i64().unwrap(),
            point["yhat"].as_i64().unwrap(),
            point["yhat_upper"].as_i64().unwrap(),
        );
        assert!(lo <= mid && mid <= hi, "{point}");
    }
}

#[tokio::test]
async fn test_unknown_operation_is_not_found_data() {
    let data = fixture();
    let config = config(&data);

    // Raw wire text keeps the full envelope
    let server = server(&config);
    let line = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": FORECAST_SALES, "arguments": {"operation": "NoSuchCity", "include_history": true}}
    })
    .to_string();
    let response = serde_json::to_value(server.handle_line(&line).await.unwrap()).unwrap();
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(text).unwrap(),
        json!({"error": "No data found for operation: NoSuchCity", "forecast": []})
    );
    assert_eq!(response["result"]["isError"], json!(true));

    // The session classifies it as a failed call
    let session = connected(&config).await;
    let result = session
        .invoke(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 3, "operation": "NoSuchCity"})))
        .await
        .unwrap();
    assert_eq!(result, ToolResult::failure("No data found for operation: NoSuchCity"));
}

#[tokio::test]
async fn test_missing_dataset_is_reported_per_call() {
    let config = AppConfig {
        data_path: "/nonexistent/sales.csv".into(),
        ..AppConfig::default()
    };
    let session = connected(&config).await;

    let result = session
        .invoke(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 3, "operation": "Dallas"})))
        .await
        .unwrap();
    assert!(result.error_message().unwrap().contains("Data file not found"));
}

#[tokio::test]
async fn test_forecast_disabled_is_an_error_envelope() {
    let data = fixture();
    let config = AppConfig {
        forecast_enabled: false,
        ..config(&data)
    };
    let session = connected(&config).await;

    let result = session
        .invoke(&ToolCall::from_json(FORECAST_SALES, json!({"operation": "Dallas"})))
        .await
        .unwrap();
    assert!(!result.is_ok());

    // The other tool is unaffected
    let top = session
        .invoke(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 1, "operation": "Dallas"})))
        .await
        .unwrap();
    assert!(top.is_ok());
}

/// Plays back completions and records what it was sent
struct ScriptedModel {
    script: Mutex<VecDeque<Completion>>,
    seen_tools: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(script: Vec<Completion>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen_tools: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedModel {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "scripted".into(),
            model: "test".into(),
            supports_tools: true,
        }
    }

    fn translator(&self) -> &dyn SchemaTranslator {
        &JsonSchemaTranslator
    }

    async fn health_check(&self) -> CoreResult<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        _messages: &[Message],
        tools: &[FunctionDeclaration],
        _options: &GenerationOptions,
    ) -> CoreResult<Completion> {
        *self.seen_tools.lock().unwrap() = tools.iter().map(|d| d.name.clone()).collect();
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
        next.ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }
}

#[tokio::test]
async fn test_single_tool_round_then_answer() {
    let data = fixture();
    let config = config(&data);
    let model = ScriptedModel::new(vec![
        Completion::tool_call(ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 5, "operation": "Dallas"}))),
        Completion::text("Product 6 is the best seller in Dallas."),
    ]);

    let mut agent = AgentBuilder::new()
        .provider(model.clone())
        .transport(RpcSession::new(Arc::new(InProcessConnector::new(server(&config)))))
        .system_prompt(sales_analytics::ANALYTICS_PROMPT)
        .connect()
        .await
        .unwrap();

    let reply = agent.send_message("What are the top 5 products in Dallas?").await.unwrap();
    assert_eq!(reply, "Product 6 is the best seller in Dallas.");

    let conversation = agent.conversation();
    assert_eq!(conversation.count(Role::ToolResult), 1);
    let tool_turn = conversation
        .messages()
        .iter()
        .find(|m| m.role == Role::ToolResult)
        .unwrap();
    assert!(tool_turn.content.starts_with("Here is the data from the top_n_products function:"));
    assert!(tool_turn.content.contains("\"PRODUCT_ID\": \"P6\""));
    assert_eq!(*model.seen_tools.lock().unwrap(), [TOP_N_PRODUCTS, FORECAST_SALES]);

    agent.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_forecast_round_is_annotated_with_dates() {
    let data = fixture();
    let config = config(&data);
    let model = ScriptedModel::new(vec![
        Completion::tool_call(ToolCall::from_json(
            FORECAST_SALES,
            json!({"operation": "Charlotte", "include_history": false}),
        )),
        Completion::text("Charlotte keeps growing."),
    ]);

    let mut agent = AgentBuilder::new()
        .provider(model)
        .transport(RpcSession::new(Arc::new(InProcessConnector::new(server(&config)))))
        .annotator(Arc::new(ForecastAnnotator::new()))
        .connect()
        .await
        .unwrap();

    agent.send_message("Forecast Charlotte").await.unwrap();

    let tool_turn = agent
        .conversation()
        .messages()
        .iter()
        .find(|m| m.role == Role::ToolResult)
        .unwrap();
    assert!(tool_turn.content.starts_with("IMPORTANT CONTEXT:"));
    assert!(tool_turn.content.contains("Forecast period: 2025-04-01 to 2025-09-01"));
}

#[tokio::test]
async fn test_smoke_and_repl_commands() {
    let data = fixture();
    let session = connected(&config(&data)).await;

    let mut out = Vec::new();
    commands::smoke(&session, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Available tools (2):"));
    assert!(text.contains("Top 5 products for Dallas:"));
    assert!(text.contains(r#">>> forecast_sales {"include_history":false,"operation":"Dallas"}"#));
    assert!(text.contains("Forecast for Dallas: 6 points from 2025-01-01 to 2025-06-01"));
    assert!(text.contains("Forecast for Charlotte: 15 points from 2024-07-01 to 2025-09-01"));

    assert_eq!(
        commands::repl_line(&session, "list").await.unwrap(),
        ReplStep::Print(format!(
            "{TOP_N_PRODUCTS}: {}\n{FORECAST_SALES}: {}",
            session.tools().unwrap()[0].description,
            session.tools().unwrap()[1].description
        ))
    );

    let ReplStep::Print(called) =
        commands::repl_line(&session, r#"call top_n_products {"n": 1, "operation": "Charlotte"}"#)
            .await
            .unwrap()
    else {
        panic!("expected output");
    };
    assert!(called.contains("\"PRODUCT_ID\": \"P1\""));

    let ReplStep::Print(bad) = commands::repl_line(&session, "call top_n_products {oops").await.unwrap() else {
        panic!("expected output");
    };
    assert!(bad.starts_with("Invalid JSON arguments"));

    assert_eq!(commands::repl_line(&session, "quit").await.unwrap(), ReplStep::Quit);
}

#[tokio::test]
async fn test_tool_server_binary_over_stdio() {
    let data = fixture();
    let connector = StdioConnector::new(env!("CARGO_BIN_EXE_sales-tool-server"))
        .env("SALES_DATA_PATH", data.path().display().to_string())
        .env("RUST_LOG", "error");
    let mut session = RpcSession::new(Arc::new(connector));

    session.connect().await.unwrap();
    assert_eq!(session.tools().unwrap().len(), 2);

    let result = session
        .invoke(&ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 2, "operation": "Charlotte"})))
        .await
        .unwrap();
    assert_eq!(result.payload().unwrap()["products"].as_array().unwrap().len(), 2);

    session.disconnect().await.unwrap();
    assert!(!session.is_connected());
}
