//! Conversation Orchestrator
//!
//! Drives one user turn to completion:
//!
//! ```text
//! AwaitingUserInput ─▶ ModelCall ─┬─▶ Finished(text)
//!                         ▲       └─▶ ToolRequested ─▶ Invoking ─┐
//!                         └──────────────────────────────────────┘
//! ```
//!
//! Tool failures are annotated and handed back to the model. Only transport
//! failures, model failures and the round cap end a turn with an error.

use std::sync::Arc;
use std::time::Duration;

use crate::annotate::{PlainAnnotator, ResultAnnotator};
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::schema::FunctionDeclaration;
use crate::session::Session;
use crate::tool::{ToolCall, ToolDefinition, ToolResult};
use crate::transport::ToolTransport;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt, recorded as the first turn of the session
    pub system_prompt: String,

    /// Tool-call rounds allowed per user turn
    pub max_tool_rounds: usize,

    /// Deadline for a single model call
    pub model_timeout: Option<Duration>,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_tool_rounds: 5,
            model_timeout: Some(Duration::from_secs(120)),
            generation: GenerationOptions::default(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Use the available functions when they can answer the question, then explain the result concisely.";

/// Where the current user turn stands
#[derive(Clone, Debug, PartialEq)]
pub enum TurnState {
    AwaitingUserInput,
    ModelCall,
    ToolRequested(ToolCall),
    Invoking(ToolCall),
    Finished(String),
}

/// The main Agent struct: one session, one tool server, one provider
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    transport: Box<dyn ToolTransport>,
    annotator: Arc<dyn ResultAnnotator>,
    declarations: Vec<FunctionDeclaration>,
    session: Session,
    config: AgentConfig,
}

impl Agent {
    /// Connect the transport and translate the advertised tools for the provider.
    ///
    /// A tool the provider cannot express is a configuration error; the
    /// transport is released before it is returned.
    pub async fn connect(
        provider: Arc<dyn LlmProvider>,
        mut transport: Box<dyn ToolTransport>,
        config: AgentConfig,
    ) -> Result<Self> {
        transport.connect().await?;

        let declarations = match transport
            .tools()
            .and_then(|tools| provider.translator().translate_all(tools))
        {
            Ok(declarations) => declarations,
            Err(e) => {
                if let Err(close_err) = transport.disconnect().await {
                    tracing::warn!(error = %close_err, "Failed to disconnect after translation error");
                }
                return Err(e);
            }
        };

        tracing::info!(
            provider = %provider.info().name,
            tools = declarations.len(),
            max_tool_rounds = config.max_tool_rounds,
            "Agent ready"
        );

        Ok(Self {
            provider,
            transport,
            annotator: Arc::new(PlainAnnotator),
            declarations,
            session: Session::with_system_prompt(config.system_prompt.clone()),
            config,
        })
    }

    /// Replace the result annotator
    pub fn with_annotator(mut self, annotator: Arc<dyn ResultAnnotator>) -> Self {
        self.annotator = annotator;
        self
    }

    /// Run one user turn and return the model's final text
    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let mut state = TurnState::AwaitingUserInput;
        let mut rounds = 0;

        loop {
            state = match state {
                TurnState::AwaitingUserInput => {
                    self.session.record(Message::user(text));
                    TurnState::ModelCall
                }
                TurnState::ModelCall => {
                    let completion = self.call_model().await?;
                    self.record_reply(completion)
                }
                TurnState::ToolRequested(call) => {
                    if rounds >= self.config.max_tool_rounds {
                        tracing::warn!(rounds, tool = %call.name, "Tool round cap reached");
                        return Err(AgentError::ToolLoopExceeded(self.config.max_tool_rounds));
                    }
                    rounds += 1;
                    TurnState::Invoking(call)
                }
                TurnState::Invoking(call) => {
                    let result = self.invoke(&call).await?;
                    let annotated = self.annotator.annotate(&call.name, &result);
                    self.session.record(Message::tool_result(&call.name, annotated));
                    TurnState::ModelCall
                }
                TurnState::Finished(reply) => return Ok(reply),
            };
        }
    }

    async fn call_model(&self) -> Result<Completion> {
        tracing::debug!(
            turns = self.session.message_count(),
            model = %self.config.generation.model,
            "Calling model"
        );

        let request = self.provider.complete(
            self.session.conversation().messages(),
            &self.declarations,
            &self.config.generation,
        );

        match self.config.model_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| AgentError::ModelCallTimeout(limit))?,
            None => request.await,
        }
    }

    /// Log the model reply and pick the next state
    fn record_reply(&mut self, completion: Completion) -> TurnState {
        if completion.tool_calls.len() > 1 {
            tracing::warn!(
                requested = completion.tool_calls.len(),
                "Model requested several tools, only the first is honoured"
            );
        }

        match completion.tool_calls.into_iter().next() {
            Some(mut call) => {
                if call.id.is_none() {
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                }
                tracing::debug!(tool = %call.name, "Model requested tool");
                self.session
                    .record(Message::model_tool_call(completion.content, call.clone()));
                TurnState::ToolRequested(call)
            }
            None => {
                self.session.record(Message::model(completion.content.clone()));
                TurnState::Finished(completion.content)
            }
        }
    }

    /// Tool-level failures become `Err` results; session-level failures propagate
    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        match self.transport.invoke(call).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_tool_recoverable() => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed, reporting to model");
                Ok(ToolResult::Err(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Conversation log of this session
    pub fn conversation(&self) -> &Conversation {
        self.session.conversation()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Tools advertised by the server
    pub fn tools(&self) -> Result<&[ToolDefinition]> {
        self.transport.tools()
    }

    /// Declarations sent to the model with every call
    pub fn declarations(&self) -> &[FunctionDeclaration] {
        &self.declarations
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// End the session and release the transport
    pub async fn disconnect(&mut self) -> Result<()> {
        self.session.end();
        self.transport.disconnect().await
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    transport: Option<Box<dyn ToolTransport>>,
    annotator: Option<Arc<dyn ResultAnnotator>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            transport: None,
            annotator: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn transport(mut self, transport: impl ToolTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn annotator(mut self, annotator: Arc<dyn ResultAnnotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_tool_rounds(mut self, max: usize) -> Self {
        self.config.max_tool_rounds = max;
        self
    }

    pub fn model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.model_timeout = timeout;
        self
    }

    /// Connect and build
    pub async fn connect(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| AgentError::Config("Tool transport is required".into()))?;

        let agent = Agent::connect(provider, transport, self.config).await?;
        Ok(match self.annotator {
            Some(annotator) => agent.with_annotator(annotator),
            None => agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::provider::ProviderInfo;
    use crate::schema::{JsonSchemaTranslator, SchemaTranslator};
    use crate::server::ToolServer;
    use crate::tool::{Arguments, ParamType, ParameterSchema, Tool, ToolRegistry};
    use crate::transport::{InProcessConnector, RpcSession};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions; repeats the last one when the script runs out
    struct ScriptedProvider {
        script: Mutex<VecDeque<Completion>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Completion>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                delay: None,
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
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

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[FunctionDeclaration],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
            next.ok_or_else(|| AgentError::Provider("script exhausted".into()))
        }
    }

    struct Count;

    #[async_trait]
    impl Tool for Count {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("count", "Count to n")
                .param(ParameterSchema::new("n", ParamType::Integer, "Upper bound").required())
        }

        async fn execute(&self, args: &Arguments) -> Result<Value> {
            let n = args.integer("n").unwrap_or_default();
            Ok(json!({ "values": (1..=n).collect::<Vec<_>>() }))
        }
    }

    fn transport() -> RpcSession {
        let mut registry = ToolRegistry::new();
        registry.register(Count).unwrap();
        let server = Arc::new(ToolServer::new(registry, "count-server", "0.0.1"));
        RpcSession::new(Arc::new(InProcessConnector::new(server)))
    }

    fn count_call(n: i64) -> Completion {
        Completion::tool_call(ToolCall::from_json("count", json!({ "n": n })))
    }

    async fn agent(provider: Arc<dyn LlmProvider>, max_tool_rounds: usize) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .transport(transport())
            .max_tool_rounds(max_tool_rounds)
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_tool_round_then_answer() {
        let provider = ScriptedProvider::new(vec![count_call(3), Completion::text("1, 2, 3")]);
        let mut agent = agent(provider, 5).await;

        assert_eq!(agent.declarations().len(), 1);

        let reply = agent.send_message("count to three").await.unwrap();
        assert_eq!(reply, "1, 2, 3");

        let roles: Vec<Role> = agent.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Model, Role::ToolResult, Role::Model]
        );
        assert_eq!(agent.conversation().count(Role::ToolResult), 1);

        let tool_turn = &agent.conversation().messages()[3];
        assert_eq!(tool_turn.tool_name.as_deref(), Some("count"));
        assert!(tool_turn.content.contains("Here is the data from the count function"));
        assert!(agent.conversation().messages()[2].tool_call.is_some());

        agent.disconnect().await.unwrap();
        assert!(!agent.session().active);
    }

    #[tokio::test]
    async fn test_round_cap_raises_tool_loop_exceeded() {
        let provider = ScriptedProvider::new(vec![count_call(1)]);
        let mut agent = agent(provider, 2).await;

        let err = agent.send_message("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolLoopExceeded(2)));
        assert_eq!(agent.conversation().count(Role::ToolResult), 2);

        agent.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_tool_error_is_handed_back_to_model() {
        let provider = ScriptedProvider::new(vec![
            Completion::tool_call(ToolCall::from_json("count", json!({}))),
            Completion::text("I need a number."),
        ]);
        let mut agent = agent(provider, 5).await;

        let reply = agent.send_message("count").await.unwrap();
        assert_eq!(reply, "I need a number.");

        let tool_turn = &agent.conversation().messages()[3];
        assert_eq!(
            tool_turn.content,
            "Error calling function count: missing required parameter: n"
        );

        agent.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_model_timeout() {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(vec![Completion::text("late")].into()),
            delay: Some(Duration::from_millis(200)),
        });
        let mut agent = AgentBuilder::new()
            .provider(provider)
            .transport(transport())
            .model_timeout(Some(Duration::from_millis(20)))
            .connect()
            .await
            .unwrap();

        let err = agent.send_message("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::ModelCallTimeout(_)));

        agent.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_only_first_of_several_calls_is_dispatched() {
        let mut both = count_call(2);
        both.tool_calls.push(ToolCall::from_json("count", json!({ "n": 9 })));
        let provider = ScriptedProvider::new(vec![both, Completion::text("1, 2")]);
        let mut agent = agent(provider, 5).await;

        agent.send_message("count to two").await.unwrap();

        let conversation = agent.conversation();
        assert_eq!(conversation.count(Role::ToolResult), 1);
        let logged = conversation.messages()[2].tool_call.as_ref().unwrap();
        assert_eq!(logged.arguments["n"], json!(2));
        assert!(conversation.messages()[3].content.contains("\"values\": [\n    1,\n    2\n  ]"));

        agent.disconnect().await.unwrap();
    }

    struct Nap;

    #[async_trait]
    impl Tool for Nap {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("nap", "Sleep for a while")
                .param(ParameterSchema::new("millis", ParamType::Integer, "Sleep").required())
        }

        async fn execute(&self, args: &Arguments) -> Result<Value> {
            let millis = u64::try_from(args.integer("millis").unwrap_or_default()).unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(json!({ "slept": millis }))
        }
    }

    #[tokio::test]
    async fn test_tool_timeout_is_handed_back_to_model() {
        let mut registry = ToolRegistry::new();
        registry.register(Nap).unwrap();
        let server = Arc::new(ToolServer::new(registry, "nap-server", "0.0.1"));
        let session =
            RpcSession::new(Arc::new(InProcessConnector::new(server))).with_invoke_timeout(Duration::from_millis(30));

        let provider = ScriptedProvider::new(vec![
            Completion::tool_call(ToolCall::from_json("nap", json!({ "millis": 300 }))),
            Completion::text("The tool was too slow."),
        ]);
        let mut agent = AgentBuilder::new()
            .provider(provider)
            .transport(session)
            .connect()
            .await
            .unwrap();

        let reply = agent.send_message("take a nap").await.unwrap();
        assert_eq!(reply, "The tool was too slow.");

        let tool_turn = &agent.conversation().messages()[3];
        assert_eq!(tool_turn.role, Role::ToolResult);
        assert!(tool_turn.content.starts_with("Error calling function nap: Tool 'nap' timed out"));

        // Let the late reply land before closing the channel
        tokio::time::sleep(Duration::from_millis(400)).await;
        agent.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnected_transport_ends_the_turn() {
        let provider = ScriptedProvider::new(vec![count_call(1), Completion::text("unreachable")]);
        let mut agent = agent(provider, 5).await;
        agent.transport.disconnect().await.unwrap();

        let err = agent.send_message("count").await.unwrap_err();
        assert!(matches!(err, AgentError::NotConnected));
        assert_eq!(agent.conversation().count(Role::ToolResult), 0);
    }

    /// Hands out a catalog, then fails every call as a dead channel would
    struct DeadChannel {
        tools: Vec<ToolDefinition>,
    }

    #[async_trait]
    impl ToolTransport for DeadChannel {
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn tools(&self) -> Result<&[ToolDefinition]> {
            Ok(&self.tools)
        }

        async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
            Ok(self.tools.clone())
        }

        async fn invoke(&self, _call: &ToolCall) -> Result<ToolResult> {
            Err(AgentError::Transport("tool server closed the channel".into()))
        }

        async fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_transport_failure_ends_the_turn() {
        let provider = ScriptedProvider::new(vec![count_call(1), Completion::text("unreachable")]);
        let mut agent = AgentBuilder::new()
            .provider(provider)
            .transport(DeadChannel {
                tools: vec![Count.definition()],
            })
            .connect()
            .await
            .unwrap();

        let err = agent.send_message("count").await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
        assert_eq!(agent.conversation().count(Role::ToolResult), 0);
    }

    #[tokio::test]
    async fn test_builder_requires_provider() {
        let err = AgentBuilder::new().transport(transport()).connect().await;
        assert!(matches!(err, Err(AgentError::Config(_))));
    }
}
