use async_trait::async_trait;
use qraft_domain::ExternalSessionId;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct StartSessionRequest {
    pub prompt: String,
    pub project_path: PathBuf,
    pub resume_session_id: Option<ExternalSessionId>,
}

/// One message from a backend session, tagged by kind. Payloads stay untyped;
/// shape sniffing happens in the normalizer.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendMessage {
    Message(Value),
    ToolCall(Value),
    ToolResult(Value),
    Error(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendCompletion {
    pub success: bool,
    pub error: Option<String>,
}

impl BackendCompletion {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendSessionState {
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BackendSessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BackendSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live backend run. Messages are pulled one at a time so that ordering
/// across kinds is the order the backend produced them in.
#[async_trait]
pub trait AgentBackendSession: Send {
    /// `Ok(None)` once the backend has no more output.
    async fn next_message(&mut self) -> anyhow::Result<Option<BackendMessage>>;

    async fn wait_for_completion(&mut self) -> BackendCompletion;

    fn state(&self) -> BackendSessionState;

    /// Graceful stop. Completion is still reported through `wait_for_completion`.
    async fn cancel(&mut self) -> anyhow::Result<()>;

    /// Forced stop of the underlying resource.
    async fn abort(&mut self) -> anyhow::Result<()>;

    /// Frees the session's resources. Must tolerate repeated calls.
    async fn release(&mut self);
}

#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> anyhow::Result<Box<dyn AgentBackendSession>>;

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
