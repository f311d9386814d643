//! Session Transport
//!
//! Client side of the tool protocol. A session owns one duplex channel to
//! one tool server and moves through connect → ready → disconnect:
//!
//! ```text
//!  Disconnected ──connect()──▶ handshake + tools/list ──▶ Ready
//!       ▲                                                   │
//!       └──────────────────── disconnect() ◀────────────────┘
//! ```
//!
//! Round-trips are lock-step: the channel sits behind an async mutex, so two
//! `invoke` calls on one session are serialised, never interleaved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::protocol::{
    method, read_message, write_message, CallToolResult, InitializeResult, ListToolsResult,
    RpcRequest, RpcResponse, ServerInfo, PROTOCOL_VERSION,
};
use crate::server::ToolServer;
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

/// How long `disconnect` waits for the peer to go away before forcing it.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Session Transport contract used by the orchestrator
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Open the channel, handshake and cache the tool list. No-op when already connected.
    async fn connect(&mut self) -> Result<()>;

    /// Tool list cached during the handshake
    fn tools(&self) -> Result<&[ToolDefinition]>;

    /// Fetch the tool list again from the server
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    /// One lock-step invocation round-trip
    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Release the channel. Idempotent.
    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Releases whatever sits behind a channel (child process, server task)
#[async_trait]
pub trait ChannelCloser: Send + Sync {
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A raw duplex byte channel to a tool server
pub struct Channel {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    closer: Option<Box<dyn ChannelCloser>>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

impl Channel {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
            closer: None,
        }
    }

    pub fn with_closer(mut self, closer: impl ChannelCloser + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }
}

/// Opens channels; one implementation per way of reaching a server
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable target, for logs
    fn describe(&self) -> String;

    async fn open(&self) -> Result<Channel>;
}

struct Link {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    pending: Vec<u8>,
}

impl Link {
    /// Write a whole request line. Never cut short by a deadline, so the
    /// channel cannot be left holding half a message.
    async fn send(&mut self, id: u64, method: &str, params: Value) -> Result<()> {
        write_message(&mut self.writer, &RpcRequest::new(id, method, params))
            .await
            .map_err(|e| AgentError::Transport(format!("write failed: {e}")))
    }

    /// Read until the response for `id` arrives. Responses with other ids are
    /// leftovers from timed-out calls. Cancel-safe: a partly read line stays
    /// in `pending`.
    async fn receive(&mut self, id: u64, method: &str) -> Result<Value> {
        let expected = Value::from(id);
        loop {
            let line = read_message(&mut self.reader, &mut self.pending)
                .await
                .map_err(|e| AgentError::Transport(format!("read failed: {e}")))?
                .ok_or_else(|| AgentError::Transport("tool server closed the channel".into()))?;

            let response: RpcResponse = serde_json::from_str(&line)
                .map_err(|e| AgentError::Protocol(format!("malformed response: {e}")))?;

            if response.id != expected {
                tracing::debug!(expected = id, got = %response.id, "Discarding stale response");
                continue;
            }
            if let Some(err) = response.error {
                return Err(AgentError::Protocol(format!(
                    "{method} failed: {} ({})",
                    err.message, err.code
                )));
            }
            return response
                .result
                .ok_or_else(|| AgentError::Protocol(format!("{method} returned neither result nor error")));
        }
    }
}

struct Connected {
    link: Mutex<Link>,
    closer: Option<Box<dyn ChannelCloser>>,
    next_id: AtomicU64,
    server: ServerInfo,
    tools: Vec<ToolDefinition>,
}

impl Connected {
    fn new(channel: Channel) -> Self {
        Self {
            link: Mutex::new(Link {
                reader: channel.reader,
                writer: channel.writer,
                pending: Vec::new(),
            }),
            closer: channel.closer,
            next_id: AtomicU64::new(1),
            server: ServerInfo {
                name: String::new(),
                version: String::new(),
            },
            tools: Vec::new(),
        }
    }

    /// Send one request and wait for the response with the same id.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let mut link = self.link.lock().await;
        let id = self.next_id();
        link.send(id, method, params).await?;
        link.receive(id, method).await
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let mut link = self.link.lock().await;
        write_message(&mut link.writer, &RpcRequest::notification(method))
            .await
            .map_err(|e| AgentError::Transport(format!("write failed: {e}")))
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDefinition>> {
        let result: ListToolsResult = serde_json::from_value(self.request(method::LIST_TOOLS, Value::Null).await?)
            .map_err(|e| AgentError::Protocol(format!("malformed tools/list result: {e}")))?;

        result
            .tools
            .into_iter()
            .map(crate::protocol::ToolDescriptor::into_definition)
            .collect()
    }

    async fn close(self) -> Result<()> {
        let Connected { link, closer, .. } = self;
        // Dropping the write half signals EOF to the server
        drop(link);
        match closer {
            Some(closer) => closer.close().await,
            None => Ok(()),
        }
    }
}

/// JSON-RPC session over any [`Connector`]
pub struct RpcSession {
    connector: Arc<dyn Connector>,
    invoke_timeout: Option<Duration>,
    state: Option<Connected>,
}

impl RpcSession {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            invoke_timeout: None,
            state: None,
        }
    }

    /// Bound each invocation round-trip; expiry surfaces as `ToolInvocationTimeout`
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.state.as_ref().map(|c| &c.server)
    }

    fn connected(&self) -> Result<&Connected> {
        self.state.as_ref().ok_or(AgentError::NotConnected)
    }

    async fn handshake(conn: &mut Connected) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "agent-core", "version": env!("CARGO_PKG_VERSION")},
        });
        let init: InitializeResult = serde_json::from_value(conn.request(method::INITIALIZE, params).await?)
            .map_err(|e| AgentError::Protocol(format!("malformed initialize result: {e}")))?;

        if init.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = %init.protocol_version,
                client = PROTOCOL_VERSION,
                "Protocol version mismatch, continuing"
            );
        }
        conn.notify(method::INITIALIZED).await?;

        conn.server = init.server_info;
        conn.tools = conn.fetch_tools().await?;
        Ok(())
    }
}

#[async_trait]
impl ToolTransport for RpcSession {
    async fn connect(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }

        let target = self.connector.describe();
        tracing::debug!(%target, "Opening tool channel");
        let mut conn = Connected::new(self.connector.open().await?);

        if let Err(e) = Self::handshake(&mut conn).await {
            if let Err(close_err) = conn.close().await {
                tracing::warn!(error = %close_err, "Failed to release channel after handshake error");
            }
            return Err(e);
        }

        tracing::info!(
            %target,
            server = %conn.server.name,
            tools = conn.tools.len(),
            "Session connected"
        );
        self.state = Some(conn);
        Ok(())
    }

    fn tools(&self) -> Result<&[ToolDefinition]> {
        Ok(&self.connected()?.tools)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        self.connected()?.fetch_tools().await
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        let conn = self.connected()?;
        let params = json!({ "name": call.name, "arguments": call.arguments });

        let mut link = conn.link.lock().await;
        let id = conn.next_id();
        link.send(id, method::CALL_TOOL, params).await?;

        // The deadline covers the wait for the reply only
        let reply = link.receive(id, method::CALL_TOOL);
        let raw = match self.invoke_timeout {
            Some(limit) => tokio::time::timeout(limit, reply)
                .await
                .map_err(|_| AgentError::ToolInvocationTimeout {
                    tool: call.name.clone(),
                    after: limit,
                })??,
            None => reply.await?,
        };
        drop(link);

        let result: CallToolResult = serde_json::from_value(raw)
            .map_err(|e| AgentError::Protocol(format!("malformed tools/call result: {e}")))?;
        let text = result.joined_text();

        Ok(match ToolResult::from_text(&text) {
            ToolResult::Ok(_) if result.is_error => ToolResult::Err(text),
            classified => classified,
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(conn) = self.state.take() else {
            return Ok(());
        };
        conn.close().await?;
        tracing::info!(target = %self.connector.describe(), "Session disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_some()
    }
}

/// Runs a [`ToolServer`] on a task inside this process, linked by an in-memory pipe
pub struct InProcessConnector {
    server: Arc<ToolServer>,
}

impl InProcessConnector {
    pub fn new(server: Arc<ToolServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    fn describe(&self) -> String {
        format!("in-process:{}", self.server.info().name)
    }

    async fn open(&self) -> Result<Channel> {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let (server_reader, server_writer) = tokio::io::split(server_end);
        let server = self.server.clone();
        let task = tokio::spawn(async move { server.serve(server_reader, server_writer).await });

        let (reader, writer) = tokio::io::split(client_end);
        Ok(Channel::new(reader, writer).with_closer(TaskCloser(task)))
    }
}

struct TaskCloser(JoinHandle<Result<()>>);

#[async_trait]
impl ChannelCloser for TaskCloser {
    async fn close(self: Box<Self>) -> Result<()> {
        let TaskCloser(task) = *self;
        let abort = task.abort_handle();
        match tokio::time::timeout(CLOSE_GRACE, task).await {
            Ok(Ok(served)) => served,
            Ok(Err(join)) => Err(AgentError::Transport(format!("server task failed: {join}"))),
            Err(_) => {
                abort.abort();
                Ok(())
            }
        }
    }
}
