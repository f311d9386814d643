//! # agent-runtime
//!
//! Runtime integrations for the agent system.
//!
//! ## Providers
//!
//! - **Gemini**: the `generateContent` REST API
//!
//! ## Connectors
//!
//! - **Stdio**: a tool server running as a child process
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{GeminiProvider, StdioConnector};
//!
//! let provider = GeminiProvider::from_env()?;
//! let session = RpcSession::new(Arc::new(StdioConnector::new("sales-tool-server")));
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .transport(session)
//!     .connect()
//!     .await?;
//! ```

pub mod gemini;
pub mod stdio;

pub use gemini::{GeminiConfig, GeminiProvider, GeminiTranslator};
pub use stdio::StdioConnector;

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, Result, Role, RpcSession, ToolTransport,
};
