use anyhow::Context as _;
use qraft_backend::agent::{AgentRunner, BackendAgentRunner, ClaudeCliBackend, OfflineAgentRunner};
use qraft_backend::{PromptStore, SqliteStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;

mod broadcaster;
mod config;
mod convert;
pub mod queue;
pub mod server;

pub use broadcaster::{BroadcastMessage, ChannelBroadcaster, QueueBroadcaster};
pub use config::{AgentBackendKind, DEFAULT_SERVER_ADDR, RuntimeConfig};
pub use queue::{
    DispatchOptions, ExecutionQueue, QueueError, SESSION_TIMED_OUT_ERROR, SubmitRequest,
};

pub struct StartedServer {
    pub addr: SocketAddr,
    pub queue: ExecutionQueue,
    broadcaster: ChannelBroadcaster,
    handle: Option<tokio::task::JoinHandle<anyhow::Result<()>>>,
}

impl StartedServer {
    /// Receives every `queue:update` and `prompt:update` published after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcaster.subscribe()
    }

    /// Stops accepting HTTP requests, then drains the queue: waiting prompts
    /// are cancelled and running ones aborted before the agent runner closes.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.queue
            .shutdown()
            .await
            .context("failed to shut down execution queue")?;
        self.queue.stopped().await;
        Ok(())
    }

    /// Runs until the HTTP server stops.
    pub async fn serve(&mut self) -> anyhow::Result<()> {
        let handle = self.handle.as_mut().context("server task already consumed")?;

        handle
            .await
            .context("server task panicked")?
            .context("server failed")?;
        Ok(())
    }
}

impl Drop for StartedServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

pub fn agent_runner(config: &RuntimeConfig) -> Arc<dyn AgentRunner> {
    match config.agent_backend {
        AgentBackendKind::Claude => Arc::new(BackendAgentRunner::new(Arc::new(
            ClaudeCliBackend::new(config.claude_exec.clone()),
        ))),
        AgentBackendKind::Offline => Arc::new(OfflineAgentRunner),
    }
}

pub async fn start_server() -> anyhow::Result<StartedServer> {
    start_server_with_config(RuntimeConfig::from_env()?).await
}

/// Opens the store, resets prompts a previous process left in flight, then
/// starts the queue and the HTTP listener.
pub async fn start_server_with_config(config: RuntimeConfig) -> anyhow::Result<StartedServer> {
    let store = Arc::new(SqliteStore::new(config.db_path.clone())?);

    let recovered = {
        let store = store.clone();
        queue::run_blocking(move || store.recover_interrupted())
            .await
            .context("failed to recover interrupted prompts")?
    };
    if recovered > 0 {
        tracing::warn!(recovered, "reset interrupted prompts to pending");
    } else {
        tracing::info!(recovered, "no interrupted prompts to recover");
    }

    let broadcaster = ChannelBroadcaster::default();
    let queue = ExecutionQueue::start(
        agent_runner(&config),
        store.clone(),
        store.clone(),
        Arc::new(broadcaster.clone()),
        config.queue,
    );
    let app = server::router(queue.clone(), store);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    let actual = listener.local_addr().context("failed to read local addr")?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.context("server failed")?;
        Ok(())
    });

    tracing::info!(
        addr = %actual,
        backend = config.agent_backend.as_str(),
        db_path = %config.db_path.display(),
        "qraft_server started"
    );

    Ok(StartedServer {
        addr: actual,
        queue,
        broadcaster,
        handle: Some(handle),
    })
}
