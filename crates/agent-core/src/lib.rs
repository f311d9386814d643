//! # agent-core
//!
//! Core agent logic: a provider-agnostic tool-calling loop over a lock-step
//! tool protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐        ┌──────────────────────────┐
//! │              Agent               │        │        ToolServer        │
//! │  ┌────────────┐  ┌────────────┐  │ JSON-  │  ┌────────────────────┐  │
//! │  │ Reasoning  │──│ RpcSession │──┼─ RPC ──┼─▶│    ToolRegistry    │  │
//! │  │    Loop    │  └────────────┘  │ lines  │  │  (typed arguments) │  │
//! │  │            │  ┌────────────┐  │        │  └────────────────────┘  │
//! │  │            │──│LlmProvider │  │        └──────────────────────────┘
//! │  └────────────┘  │ (Strategy) │  │
//! │                  └────────────┘  │
//! └──────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait and its `SchemaTranslator` isolate everything
//! provider-specific; the `Connector` trait isolates how the tool server is
//! reached (child process, in-process task).

pub mod annotate;
pub mod error;
pub mod message;
pub mod protocol;
pub mod provider;
pub mod reasoning;
pub mod schema;
pub mod server;
pub mod session;
pub mod tool;
pub mod transport;

pub use annotate::{PlainAnnotator, ResultAnnotator};
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use schema::{FunctionDeclaration, JsonSchemaTranslator, SchemaTranslator};
pub use server::ToolServer;
pub use session::Session;
pub use tool::{
    ArgValue, Arguments, ParamType, ParameterSchema, Tool, ToolCall, ToolDefinition, ToolRegistry,
    ToolResult,
};
pub use transport::{Channel, ChannelCloser, Connector, InProcessConnector, RpcSession, ToolTransport};
