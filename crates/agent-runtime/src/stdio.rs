//! Child-process tool servers
//!
//! Launches a tool server executable and speaks to it over its stdin/stdout.
//! The child's stderr is inherited, so its logs land on the client's terminal.

use std::{path::PathBuf, process::Stdio, time::Duration};

use agent_core::{
    error::{AgentError, Result},
    transport::{Channel, ChannelCloser, Connector},
};
use async_trait::async_trait;
use tokio::process::{Child, Command};

/// How long a child gets to exit on its own once its stdin is closed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Connector that spawns a tool server as a child process
#[derive(Clone, Debug)]
pub struct StdioConnector {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl StdioConnector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment for the child, on top of the inherited one
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl Connector for StdioConnector {
    fn describe(&self) -> String {
        let mut target = self.program.display().to_string();
        for arg in &self.args {
            target.push(' ');
            target.push_str(arg);
        }
        target
    }

    async fn open(&self) -> Result<Channel> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Transport(format!("failed to start {}: {e}", self.describe())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Transport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Transport("child stdout unavailable".into()))?;

        tracing::info!(server = %self.describe(), pid = ?child.id(), "Tool server started");
        Ok(Channel::new(stdout, stdin).with_closer(ChildCloser(child)))
    }
}

struct ChildCloser(Child);

#[async_trait]
impl ChannelCloser for ChildCloser {
    async fn close(self: Box<Self>) -> Result<()> {
        let ChildCloser(mut child) = *self;

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "Tool server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(AgentError::Transport(format!("waiting for tool server: {e}"))),
            Err(_) => {
                tracing::warn!("Tool server did not exit, killing it");
                child.kill().await?;
                Ok(())
            }
        }
    }
}
