use qraft_api::{PROMPT_UPDATE_EVENT, QUEUE_UPDATE_EVENT};
use qraft_backend::agent::{AgentRunner, ExecuteParams, ExecutionControl};
use qraft_backend::{PromptStore, SessionMappingStore, SqliteStoreError};
use qraft_domain::{
    AgentEvent, ExternalSessionId, LocalPrompt, PromptId, PromptStatus, PromptUpdate,
    QraftAiSessionId, QueueConfig, QueueEntry, QueueEntryStatus, WorktreeId,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::broadcaster::QueueBroadcaster;
use crate::convert::{prompt_snapshot, queue_broadcast};

pub const SESSION_TIMED_OUT_ERROR: &str = "session timed out";
const STREAM_ENDED_ERROR: &str = "agent stream ended without completion";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue for worktree {worktree_id} is full ({max_queue_size} prompts waiting)")]
    CapacityExceeded {
        worktree_id: WorktreeId,
        max_queue_size: usize,
    },
    #[error("prompt {0} is not queued or running")]
    UnknownPrompt(PromptId),
    #[error("prompt {0} is already queued or running")]
    AlreadyQueued(PromptId),
    #[error("failed to persist prompt: {0:#}")]
    Persistence(anyhow::Error),
    #[error("execution queue is stopped")]
    Stopped,
}

impl QueueError {
    /// Persistence failure caused by an unknown prompt id.
    pub fn is_prompt_not_found(&self) -> bool {
        matches!(
            self,
            Self::Persistence(err)
                if matches!(
                    err.downcast_ref::<SqliteStoreError>(),
                    Some(SqliteStoreError::PromptNotFound)
                )
        )
    }
}

#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub prompt_id: PromptId,
    pub prompt_text: String,
    pub project_path: PathBuf,
    /// Conversation group. Derived from `resume_session_id` or generated when absent.
    pub qraft_ai_session_id: Option<QraftAiSessionId>,
    /// Explicit external session to continue. When absent the group's last
    /// known session is resumed.
    pub resume_session_id: Option<ExternalSessionId>,
}

#[derive(Clone, Debug, Default)]
pub struct DispatchOptions {
    pub qraft_ai_session_id: Option<QraftAiSessionId>,
    pub resume_session_id: Option<ExternalSessionId>,
}

/// Handle to the queue actor. Cloning is cheap; all clones talk to the same
/// actor, which is the only writer of queue state.
#[derive(Clone)]
pub struct ExecutionQueue {
    tx: mpsc::Sender<QueueCommand>,
    prompts: Arc<dyn PromptStore>,
}

impl ExecutionQueue {
    pub fn start(
        runner: Arc<dyn AgentRunner>,
        prompts: Arc<dyn PromptStore>,
        sessions: Arc<dyn SessionMappingStore>,
        broadcaster: Arc<dyn QueueBroadcaster>,
        config: QueueConfig,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueueCommand>(256);
        let mut actor = QueueActor {
            config: config.normalized(),
            runner,
            prompts: prompts.clone(),
            sessions,
            broadcaster,
            tx: tx.clone(),
            entries: HashMap::new(),
            partitions: HashMap::new(),
            next_seq: 0,
            stopped: false,
        };

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                actor.handle(cmd).await;
                if actor.stopped && actor.entries.is_empty() {
                    break;
                }
            }
            actor.close_runner().await;
        });

        Self { tx, prompts }
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<QueueEntry, QueueError> {
        self.request(|reply| QueueCommand::Submit { request, reply })
            .await?
    }

    /// Loads a stored prompt and submits it, preferring explicit options over
    /// the group recorded on the prompt.
    pub async fn dispatch_prompt(
        &self,
        prompt_id: &PromptId,
        options: DispatchOptions,
    ) -> Result<QueueEntry, QueueError> {
        let prompts = self.prompts.clone();
        let id = prompt_id.clone();
        let prompt = run_blocking(move || prompts.get(&id))
            .await
            .map_err(QueueError::Persistence)?
            .ok_or_else(|| QueueError::UnknownPrompt(prompt_id.clone()))?;

        self.submit(SubmitRequest {
            prompt_id: prompt.id,
            prompt_text: prompt.prompt_text,
            project_path: prompt.project_path,
            qraft_ai_session_id: options.qraft_ai_session_id.or(prompt.dispatch_session_id),
            resume_session_id: options.resume_session_id,
        })
        .await
    }

    /// Queued entries are dropped at once; running entries are asked to stop
    /// and finish as `cancelled` when the runner reports completion.
    pub async fn cancel(&self, prompt_id: &PromptId) -> Result<(), QueueError> {
        let prompt_id = prompt_id.clone();
        self.request(|reply| QueueCommand::Cancel {
            prompt_id,
            force: false,
            reply,
        })
        .await?
    }

    /// Like `cancel` but skips the runner's grace period.
    pub async fn abort(&self, prompt_id: &PromptId) -> Result<(), QueueError> {
        let prompt_id = prompt_id.clone();
        self.request(|reply| QueueCommand::Cancel {
            prompt_id,
            force: true,
            reply,
        })
        .await?
    }

    pub async fn entry(&self, prompt_id: &PromptId) -> Result<Option<QueueEntry>, QueueError> {
        let prompt_id = prompt_id.clone();
        self.request(|reply| QueueCommand::Entry { prompt_id, reply })
            .await
    }

    /// Live entries in submission order, optionally limited to one worktree.
    pub async fn snapshot(
        &self,
        worktree_id: Option<WorktreeId>,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        self.request(|reply| QueueCommand::Snapshot { worktree_id, reply })
            .await
    }

    /// Rejects further submissions, drops waiting entries and aborts running ones.
    /// Returns without waiting for the aborted runs; see `stopped`.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.request(|reply| QueueCommand::Shutdown { reply }).await
    }

    /// Resolves once a shut-down queue has retired its last entry and closed
    /// the agent runner.
    pub async fn stopped(&self) {
        self.tx.closed().await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> Result<T, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(command(tx))
            .await
            .map_err(|_| QueueError::Stopped)?;
        rx.await.map_err(|_| QueueError::Stopped)
    }
}

enum QueueCommand {
    Submit {
        request: SubmitRequest,
        reply: oneshot::Sender<Result<QueueEntry, QueueError>>,
    },
    Cancel {
        prompt_id: PromptId,
        force: bool,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    Entry {
        prompt_id: PromptId,
        reply: oneshot::Sender<Option<QueueEntry>>,
    },
    Snapshot {
        worktree_id: Option<WorktreeId>,
        reply: oneshot::Sender<Vec<QueueEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    AgentEvent {
        prompt_id: PromptId,
        run: u64,
        event: AgentEvent,
    },
    StreamClosed {
        prompt_id: PromptId,
        run: u64,
    },
    SessionTimedOut {
        prompt_id: PromptId,
        run: u64,
    },
}

struct Job {
    prompt_text: String,
    project_path: PathBuf,
    resume_session_id: Option<ExternalSessionId>,
}

struct Tracked {
    entry: QueueEntry,
    job: Job,
    seq: u64,
    control: Option<ExecutionControl>,
    timeout: Option<JoinHandle<()>>,
    cancel_requested: bool,
    timed_out: bool,
}

#[derive(Default)]
struct Partition {
    backlog: VecDeque<PromptId>,
    running: HashSet<PromptId>,
}

impl Partition {
    fn is_empty(&self) -> bool {
        self.backlog.is_empty() && self.running.is_empty()
    }
}

struct QueueActor {
    config: QueueConfig,
    runner: Arc<dyn AgentRunner>,
    prompts: Arc<dyn PromptStore>,
    sessions: Arc<dyn SessionMappingStore>,
    broadcaster: Arc<dyn QueueBroadcaster>,
    tx: mpsc::Sender<QueueCommand>,
    entries: HashMap<PromptId, Tracked>,
    partitions: HashMap<WorktreeId, Partition>,
    next_seq: u64,
    stopped: bool,
}

impl QueueActor {
    async fn handle(&mut self, cmd: QueueCommand) {
        match cmd {
            QueueCommand::Submit { request, reply } => {
                let result = self.submit(request).await;
                let _ = reply.send(result);
            }
            QueueCommand::Cancel {
                prompt_id,
                force,
                reply,
            } => {
                let result = self.cancel(&prompt_id, force).await;
                let _ = reply.send(result);
            }
            QueueCommand::Entry { prompt_id, reply } => {
                let _ = reply.send(self.entries.get(&prompt_id).map(|t| t.entry.clone()));
            }
            QueueCommand::Snapshot { worktree_id, reply } => {
                let _ = reply.send(self.snapshot(worktree_id.as_ref()));
            }
            QueueCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
            }
            QueueCommand::AgentEvent {
                prompt_id,
                run,
                event,
            } => {
                if self.is_current_run(&prompt_id, run) {
                    self.apply_agent_event(&prompt_id, event).await;
                }
            }
            QueueCommand::StreamClosed { prompt_id, run } => {
                if self.is_current_run(&prompt_id, run) {
                    tracing::warn!(prompt_id = %prompt_id, "agent stream closed before completion");
                    self.finish(
                        &prompt_id,
                        QueueEntryStatus::Failed,
                        Some(STREAM_ENDED_ERROR.to_owned()),
                    )
                    .await;
                }
            }
            QueueCommand::SessionTimedOut { prompt_id, run } => {
                if self.is_current_run(&prompt_id, run) {
                    self.time_out(&prompt_id);
                }
            }
        }
    }

    fn is_current_run(&self, prompt_id: &PromptId, run: u64) -> bool {
        self.entries
            .get(prompt_id)
            .is_some_and(|tracked| tracked.seq == run && tracked.control.is_some())
    }

    async fn submit(&mut self, request: SubmitRequest) -> Result<QueueEntry, QueueError> {
        if self.stopped {
            return Err(QueueError::Stopped);
        }
        if self.entries.contains_key(&request.prompt_id) {
            return Err(QueueError::AlreadyQueued(request.prompt_id));
        }

        let worktree_id = WorktreeId::from_project_path(&request.project_path);
        if let Some(partition) = self.partitions.get(&worktree_id)
            && partition.running.len() >= self.config.max_concurrent
            && partition.backlog.len() >= self.config.max_queue_size
        {
            tracing::warn!(
                prompt_id = %request.prompt_id,
                worktree_id = %worktree_id,
                max_queue_size = self.config.max_queue_size,
                "queue full; rejecting prompt"
            );
            return Err(QueueError::CapacityExceeded {
                worktree_id,
                max_queue_size: self.config.max_queue_size,
            });
        }

        let group = match (&request.qraft_ai_session_id, &request.resume_session_id) {
            (Some(group), _) => group.clone(),
            (None, Some(resume)) => QraftAiSessionId::derive_from_external(resume),
            (None, None) => QraftAiSessionId::derive_local(),
        };

        let resume_session_id = match &request.resume_session_id {
            Some(resume) => Some(resume.clone()),
            None => {
                let sessions = self.sessions.clone();
                let group = group.clone();
                run_blocking(move || sessions.get_session_mapping(&group))
                    .await
                    .map_err(QueueError::Persistence)?
            }
        };

        let prompt = self
            .persist(
                &request.prompt_id,
                PromptUpdate::status(PromptStatus::Dispatching)
                    .with_dispatch_session_id(group.clone())
                    .with_error(None),
            )
            .await
            .map_err(QueueError::Persistence)?;

        // Resumed runs skip session detection, so the mapping is written here,
        // once the prompt is accepted.
        if let Some(resume) = request.resume_session_id.clone() {
            let sessions = self.sessions.clone();
            let group = group.clone();
            let result =
                run_blocking(move || sessions.set_session_mapping(&group, &resume)).await;
            if let Err(err) = result {
                tracing::error!(prompt_id = %request.prompt_id, error = %err, "failed to persist session mapping");
            }
        }
        self.broadcast_prompt(&prompt);

        let entry = QueueEntry {
            prompt_id: request.prompt_id.clone(),
            worktree_id: worktree_id.clone(),
            qraft_ai_session_id: Some(group),
            status: QueueEntryStatus::Queued,
            current_activity: None,
            external_session_id: resume_session_id.clone(),
            error: None,
            created_at_unix_ms: qraft_domain::time::now_unix_millis(),
        };
        tracing::info!(
            prompt_id = %entry.prompt_id,
            worktree_id = %worktree_id,
            resuming = resume_session_id.is_some(),
            "prompt queued"
        );
        let queued = entry.clone();
        self.next_seq += 1;

        self.entries.insert(
            request.prompt_id.clone(),
            Tracked {
                entry,
                job: Job {
                    prompt_text: request.prompt_text,
                    project_path: request.project_path,
                    resume_session_id,
                },
                seq: self.next_seq,
                control: None,
                timeout: None,
                cancel_requested: false,
                timed_out: false,
            },
        );
        self.partitions
            .entry(worktree_id.clone())
            .or_default()
            .backlog
            .push_back(request.prompt_id.clone());
        self.publish(&request.prompt_id);

        self.pump(&worktree_id).await;

        // A run that failed to start has already been finished and dropped.
        Ok(match self.entries.get(&request.prompt_id) {
            Some(tracked) => tracked.entry.clone(),
            None => QueueEntry {
                status: QueueEntryStatus::Failed,
                ..queued
            },
        })
    }

    /// Starts backlog heads while the worktree has free run slots.
    async fn pump(&mut self, worktree_id: &WorktreeId) {
        loop {
            let Some(partition) = self.partitions.get_mut(worktree_id) else {
                return;
            };
            if partition.running.len() >= self.config.max_concurrent {
                return;
            }
            let Some(prompt_id) = partition.backlog.pop_front() else {
                return;
            };
            partition.running.insert(prompt_id.clone());
            self.start(&prompt_id).await;
        }
    }

    async fn start(&mut self, prompt_id: &PromptId) {
        let persisted = self
            .persist(prompt_id, PromptUpdate::status(PromptStatus::Dispatched))
            .await;
        let prompt = match persisted {
            Ok(prompt) => prompt,
            Err(err) => {
                tracing::error!(prompt_id = %prompt_id, error = %err, "failed to mark prompt dispatched");
                self.retire(
                    prompt_id,
                    QueueEntryStatus::Failed,
                    Some(format!("failed to persist prompt: {err:#}")),
                )
                .await;
                return;
            }
        };
        self.broadcast_prompt(&prompt);

        let Some(tracked) = self.entries.get_mut(prompt_id) else {
            return;
        };
        let handle = self.runner.execute(ExecuteParams {
            prompt: tracked.job.prompt_text.clone(),
            project_path: tracked.job.project_path.clone(),
            resume_session_id: tracked.job.resume_session_id.clone(),
        });
        let run = tracked.seq;
        tracked.control = Some(handle.control());
        tracked.entry.status = QueueEntryStatus::Running;

        let tx = self.tx.clone();
        let id = prompt_id.clone();
        tokio::spawn(async move {
            let mut events = handle.into_events();
            while let Some(event) = events.next().await {
                let terminal = event.is_terminal();
                let cmd = QueueCommand::AgentEvent {
                    prompt_id: id.clone(),
                    run,
                    event,
                };
                if tx.send(cmd).await.is_err() || terminal {
                    return;
                }
            }
            let _ = tx
                .send(QueueCommand::StreamClosed { prompt_id: id, run })
                .await;
        });

        if let Some(timeout) = self.config.session_timeout {
            tracked.timeout = Some(spawn_timeout(
                self.tx.clone(),
                prompt_id.clone(),
                run,
                timeout,
            ));
        }

        tracing::info!(prompt_id = %prompt_id, worktree_id = %tracked.entry.worktree_id, "prompt running");
        self.publish(prompt_id);
    }

    async fn apply_agent_event(&mut self, prompt_id: &PromptId, event: AgentEvent) {
        let Some(tracked) = self.entries.get_mut(prompt_id) else {
            return;
        };
        match event {
            AgentEvent::ClaudeSessionDetected {
                external_session_id,
            } => {
                tracing::info!(
                    prompt_id = %prompt_id,
                    external_session_id = %external_session_id,
                    "agent session detected"
                );
                tracked.entry.external_session_id = Some(external_session_id.clone());
                if let Some(group) = tracked.entry.qraft_ai_session_id.clone() {
                    let sessions = self.sessions.clone();
                    let result = run_blocking(move || {
                        sessions.set_session_mapping(&group, &external_session_id)
                    })
                    .await;
                    if let Err(err) = result {
                        tracing::error!(prompt_id = %prompt_id, error = %err, "failed to persist session mapping");
                    }
                }
                self.publish(prompt_id);
            }
            AgentEvent::Activity { activity } => {
                tracked.entry.current_activity = activity;
                self.publish(prompt_id);
            }
            AgentEvent::Error { message } => {
                tracked.entry.error = Some(message);
                self.publish(prompt_id);
            }
            AgentEvent::Completed { success, error, .. } => {
                let (status, error) = if tracked.timed_out {
                    (
                        QueueEntryStatus::Failed,
                        Some(SESSION_TIMED_OUT_ERROR.to_owned()),
                    )
                } else if tracked.cancel_requested {
                    (QueueEntryStatus::Cancelled, None)
                } else if success {
                    (QueueEntryStatus::Completed, None)
                } else {
                    let error = error
                        .or_else(|| tracked.entry.error.clone())
                        .unwrap_or_else(|| "agent run failed".to_owned());
                    (QueueEntryStatus::Failed, Some(error))
                };
                self.finish(prompt_id, status, error).await;
            }
            AgentEvent::Message { .. }
            | AgentEvent::ToolCall { .. }
            | AgentEvent::ToolResult { .. } => {}
        }
    }

    fn time_out(&mut self, prompt_id: &PromptId) {
        let Some(tracked) = self.entries.get_mut(prompt_id) else {
            return;
        };
        if tracked.timed_out {
            return;
        }
        tracing::warn!(prompt_id = %prompt_id, "session timed out; cancelling run");
        tracked.timed_out = true;
        tracked.timeout = None;
        tracked.entry.error = Some(SESSION_TIMED_OUT_ERROR.to_owned());
        if let Some(control) = &tracked.control {
            control.cancel();
        }
        self.publish(prompt_id);
    }

    async fn cancel(&mut self, prompt_id: &PromptId, force: bool) -> Result<(), QueueError> {
        let Some(tracked) = self.entries.get_mut(prompt_id) else {
            return Err(QueueError::UnknownPrompt(prompt_id.clone()));
        };

        match tracked.control.clone() {
            Some(control) => {
                tracing::info!(prompt_id = %prompt_id, force, "cancelling running prompt");
                tracked.cancel_requested = true;
                if force {
                    control.abort();
                } else {
                    control.cancel();
                }
            }
            None => {
                tracing::info!(prompt_id = %prompt_id, "cancelling queued prompt");
                self.finish(prompt_id, QueueEntryStatus::Cancelled, None)
                    .await;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let ids: Vec<PromptId> = self.entries.keys().cloned().collect();
        tracing::info!(entries = ids.len(), "execution queue shutting down");
        for prompt_id in ids {
            let running = self
                .entries
                .get(&prompt_id)
                .is_some_and(|tracked| tracked.control.is_some());
            if !running {
                self.finish(&prompt_id, QueueEntryStatus::Cancelled, None)
                    .await;
            }
        }
        for tracked in self.entries.values_mut() {
            tracked.cancel_requested = true;
            if let Some(control) = &tracked.control {
                control.abort();
            }
        }
    }

    /// Retires the entry and hands its slot to the next waiting prompt.
    async fn finish(
        &mut self,
        prompt_id: &PromptId,
        status: QueueEntryStatus,
        error: Option<String>,
    ) {
        let Some(worktree_id) = self.retire(prompt_id, status, error).await else {
            return;
        };
        if !self.stopped {
            self.pump(&worktree_id).await;
        }
        if self
            .partitions
            .get(&worktree_id)
            .is_some_and(Partition::is_empty)
        {
            self.partitions.remove(&worktree_id);
        }
    }

    /// Publishes the terminal state once, persists it and drops the entry.
    /// Returns the worktree whose slot was freed.
    async fn retire(
        &mut self,
        prompt_id: &PromptId,
        status: QueueEntryStatus,
        error: Option<String>,
    ) -> Option<WorktreeId> {
        let mut tracked = self.entries.remove(prompt_id)?;
        if let Some(timeout) = tracked.timeout.take() {
            timeout.abort();
        }

        let worktree_id = tracked.entry.worktree_id.clone();
        if let Some(partition) = self.partitions.get_mut(&worktree_id) {
            partition.running.remove(prompt_id);
            partition.backlog.retain(|id| id != prompt_id);
        }

        tracked.entry.status = status;
        tracked.entry.current_activity = None;
        tracked.entry.error = error.clone();
        let update = PromptUpdate::status(status.prompt_status()).with_error(error);
        match self.persist(prompt_id, update).await {
            Ok(prompt) => self.broadcast_prompt(&prompt),
            Err(err) => {
                tracing::error!(prompt_id = %prompt_id, status = %status, error = %err, "failed to persist prompt outcome");
            }
        }

        tracing::info!(prompt_id = %prompt_id, status = %status, "prompt finished");
        self.broadcast_entry(&tracked.entry, &tracked.job.prompt_text);
        Some(worktree_id)
    }

    async fn close_runner(&self) {
        match self.runner.close().await {
            Ok(()) => tracing::info!("execution queue stopped"),
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "failed to close agent runner");
            }
        }
    }

    fn snapshot(&self, worktree_id: Option<&WorktreeId>) -> Vec<QueueEntry> {
        let mut entries: Vec<(u64, QueueEntry)> = self
            .entries
            .values()
            .filter(|tracked| worktree_id.is_none_or(|id| &tracked.entry.worktree_id == id))
            .map(|tracked| (tracked.seq, tracked.entry.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }

    async fn persist(
        &self,
        prompt_id: &PromptId,
        update: PromptUpdate,
    ) -> anyhow::Result<LocalPrompt> {
        let prompts = self.prompts.clone();
        let id = prompt_id.clone();
        run_blocking(move || prompts.update(&id, update)).await
    }

    fn publish(&self, prompt_id: &PromptId) {
        if let Some(tracked) = self.entries.get(prompt_id) {
            self.broadcast_entry(&tracked.entry, &tracked.job.prompt_text);
        }
    }

    fn broadcast_entry(&self, entry: &QueueEntry, prompt_text: &str) {
        match serde_json::to_value(queue_broadcast(entry, prompt_text)) {
            Ok(data) => self.broadcaster.broadcast(QUEUE_UPDATE_EVENT, data),
            Err(err) => {
                tracing::warn!(prompt_id = %entry.prompt_id, error = %err, "failed to encode queue update");
            }
        }
    }

    fn broadcast_prompt(&self, prompt: &LocalPrompt) {
        match serde_json::to_value(prompt_snapshot(prompt)) {
            Ok(data) => self.broadcaster.broadcast(PROMPT_UPDATE_EVENT, data),
            Err(err) => {
                tracing::warn!(prompt_id = %prompt.id, error = %err, "failed to encode prompt update");
            }
        }
    }
}

fn spawn_timeout(
    tx: mpsc::Sender<QueueCommand>,
    prompt_id: PromptId,
    run: u64,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = tx
            .send(QueueCommand::SessionTimedOut { prompt_id, run })
            .await;
    })
}

pub(crate) async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => Err(anyhow::anyhow!("blocking task failed: {err}")),
    }
}
