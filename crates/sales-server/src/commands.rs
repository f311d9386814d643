//! CLI command handlers
//!
//! Each handler works against a connected [`ToolTransport`] (or an [`Agent`])
//! and writes to the given output, so the binaries stay thin.

use std::{collections::BTreeMap, io::Write};

use anyhow::{Context, Result};
use rustyline::{error::ReadlineError, Config as RlConfig, DefaultEditor};
use serde_json::{json, Value};

use agent_core::{Agent, AgentError, ToolCall, ToolResult, ToolTransport};
use sales_analytics::tools::{FORECAST_SALES, TOP_N_PRODUCTS};

const REPL_HELP: &str = "Commands:
  list                  List available tools
  call <tool> <json>    Call a tool, e.g. call top_n_products {\"n\": 5, \"operation\": \"Dallas\"}
  quit                  Exit";

/// The fixed smoke-test sequence
pub fn smoke_calls() -> Vec<ToolCall> {
    vec![
        ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 5, "operation": "Dallas"})),
        ToolCall::from_json(TOP_N_PRODUCTS, json!({"n": 3, "operation": "Charlotte"})),
        ToolCall::from_json(FORECAST_SALES, json!({"operation": "Dallas", "include_history": false})),
        ToolCall::from_json(FORECAST_SALES, json!({"operation": "Charlotte", "include_history": true})),
    ]
}

/// Print `name: description` per tool
pub fn list_tools(transport: &dyn ToolTransport, out: &mut impl Write) -> Result<()> {
    for tool in transport.tools()? {
        writeln!(out, "{}: {}", tool.name, tool.description)?;
    }
    Ok(())
}

/// List tools with their schemas, then run the smoke-test calls
pub async fn smoke(transport: &dyn ToolTransport, out: &mut impl Write) -> Result<()> {
    let tools = transport.list_tools().await?;
    writeln!(out, "Available tools ({}):", tools.len())?;
    for tool in &tools {
        writeln!(out, "\n  {}: {}", tool.name, tool.description)?;
        writeln!(out, "  input schema: {}", serde_json::to_string_pretty(&tool.input_schema())?)?;
    }

    for call in smoke_calls() {
        writeln!(out, "\n>>> {} {}", call.name, arguments_line(&call)?)?;
        let result = transport
            .invoke(&call)
            .await
            .with_context(|| format!("calling {}", call.name))?;
        writeln!(out, "{}", summarize(&call.name, &result))?;
    }
    Ok(())
}

/// Call arguments as compact JSON with keys in name order
pub fn arguments_line(call: &ToolCall) -> Result<String> {
    let sorted: BTreeMap<&String, &Value> = call.arguments.iter().collect();
    Ok(serde_json::to_string(&sorted)?)
}

/// One-paragraph human summary of a tool result
pub fn summarize(tool: &str, result: &ToolResult) -> String {
    let payload = match result {
        ToolResult::Ok(payload) => payload,
        ToolResult::Err(message) => return format!("Error: {message}"),
    };

    let rows = |key: &str| payload.get(key).and_then(Value::as_array).cloned().unwrap_or_default();
    let field = |row: &Value, key: &str| row.get(key).map(display_value).unwrap_or_default();

    match tool {
        TOP_N_PRODUCTS => {
            let products = rows("products");
            let mut summary = format!(
                "Top {} products for {}:",
                field(payload, "top_n"),
                field(payload, "operation")
            );
            for (rank, p) in products.iter().enumerate() {
                summary.push_str(&format!(
                    "\n  {}. {} ({}): {} units",
                    rank + 1,
                    field(p, "PRODUCT_NAME"),
                    field(p, "PRODUCT_ID"),
                    field(p, "UNITS_SOLD")
                ));
            }
            summary
        }
        FORECAST_SALES => {
            let forecast = rows("forecast");
            let mut summary = format!("Forecast for {}: {} points", field(payload, "operation"), forecast.len());
            if let (Some(first), Some(last)) = (forecast.first(), forecast.last()) {
                summary.push_str(&format!(" from {} to {}", field(first, "ds"), field(last, "ds")));
                summary.push_str(&format!(
                    "\n  last: {} (range {} to {})",
                    field(last, "yhat"),
                    field(last, "yhat_lower"),
                    field(last, "yhat_upper")
                ));
            }
            if let Some(warning) = payload.get("warning").and_then(Value::as_str) {
                summary.push_str(&format!("\n  warning: {warning}"));
            }
            summary
        }
        _ => result.to_text(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What the REPL should do after a line
#[derive(Debug, PartialEq, Eq)]
pub enum ReplStep {
    Print(String),
    Quit,
}

/// Execute one REPL line
pub async fn repl_line(transport: &dyn ToolTransport, line: &str) -> Result<ReplStep> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    match command {
        "quit" | "exit" | "q" => Ok(ReplStep::Quit),
        "list" => {
            let mut out = Vec::new();
            list_tools(transport, &mut out)?;
            Ok(ReplStep::Print(String::from_utf8_lossy(&out).trim_end().to_string()))
        }
        "call" => {
            let rest = rest.trim();
            let (tool, raw_args) = rest.split_once(char::is_whitespace).unwrap_or((rest, "{}"));
            if tool.is_empty() {
                return Ok(ReplStep::Print("Usage: call <tool> <json>".into()));
            }
            let args: Value = match serde_json::from_str(raw_args.trim()) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => return Ok(ReplStep::Print("Arguments must be a JSON object".into())),
                Err(e) => return Ok(ReplStep::Print(format!("Invalid JSON arguments: {e}"))),
            };
            match transport.invoke(&ToolCall::from_json(tool, args)).await {
                Ok(result) => Ok(ReplStep::Print(result.to_text())),
                Err(e) if e.is_tool_recoverable() => Ok(ReplStep::Print(format!("Error: {e}"))),
                Err(e) => Err(e.into()),
            }
        }
        _ => Ok(ReplStep::Print(REPL_HELP.into())),
    }
}

fn editor() -> Result<DefaultEditor> {
    let config = RlConfig::builder().auto_add_history(true).build();
    Ok(DefaultEditor::with_config(config)?)
}

/// Line-oriented REPL: `list`, `call <tool> <json>`, `quit`
pub async fn interactive(transport: &dyn ToolTransport) -> Result<()> {
    let mut rl = editor()?;
    println!("{REPL_HELP}");

    loop {
        match rl.readline("> ") {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => match repl_line(transport, &line).await? {
                ReplStep::Print(text) => println!("{text}"),
                ReplStep::Quit => break,
            },
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Model-driven conversation until `quit`, `exit` or `q`
pub async fn chat(agent: &mut Agent) -> Result<()> {
    let mut rl = editor()?;
    println!("Ask about sales (type 'quit' to exit).");

    loop {
        let line = match rl.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_ascii_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match agent.send_message(input).await {
            Ok(reply) => println!("\nassistant> {reply}\n"),
            Err(e @ (AgentError::NotConnected | AgentError::Transport(_) | AgentError::Protocol(_))) => {
                return Err(e.into());
            }
            Err(e) => eprintln!("\n{}\n", e.user_message()),
        }
    }
    Ok(())
}
