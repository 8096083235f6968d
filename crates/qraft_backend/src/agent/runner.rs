use async_trait::async_trait;
use qraft_domain::{AgentEvent, ExternalSessionId};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::backend::{AgentBackend, AgentBackendSession, BackendCompletion, StartSessionRequest};
use super::normalize::EventNormalizer;
use crate::event_channel::{EventReceiver, EventSender, event_channel};

/// How long a cancelled run may take to report completion before it is
/// forcibly aborted.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct ExecuteParams {
    pub prompt: String,
    pub project_path: PathBuf,
    pub resume_session_id: Option<ExternalSessionId>,
}

/// Drives one agent invocation per `execute` call. Implementations never fail
/// out of `execute`; every failure is reported as an `AgentEvent`.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn execute(&self, params: ExecuteParams) -> ExecutionHandle;

    /// Shuts the underlying backend down. Called once, after every run has
    /// finished.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Cancel/abort switch shared between a handle and whoever supervises it.
#[derive(Clone, Debug, Default)]
pub struct ExecutionControl {
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl ExecutionControl {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Abort implies cancel.
    pub fn abort(&self) {
        self.abort.cancel();
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub(crate) async fn aborted(&self) {
        self.abort.cancelled().await;
    }
}

type Work = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct ExecutionHandle {
    events: EventReceiver<AgentEvent>,
    work: Option<Work>,
    control: ExecutionControl,
}

impl ExecutionHandle {
    /// Pairs a not-yet-started run with the stream it will feed.
    pub fn new(
        events: EventReceiver<AgentEvent>,
        work: impl Future<Output = ()> + Send + 'static,
        control: ExecutionControl,
    ) -> Self {
        Self {
            events,
            work: Some(Box::pin(work)),
            control,
        }
    }

    /// Spawns the run on first call; later calls return the same stream.
    /// Must be called from within a tokio runtime.
    pub fn events(&mut self) -> &mut EventReceiver<AgentEvent> {
        if let Some(work) = self.work.take() {
            tokio::spawn(work);
        }
        &mut self.events
    }

    pub fn into_events(mut self) -> EventReceiver<AgentEvent> {
        self.events();
        self.events
    }

    pub fn control(&self) -> ExecutionControl {
        self.control.clone()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn abort(&self) {
        self.control.abort();
    }

    pub fn is_started(&self) -> bool {
        self.work.is_none()
    }
}

/// Runs prompts against an `AgentBackend`.
pub struct BackendAgentRunner {
    backend: Arc<dyn AgentBackend>,
    cancel_grace: Duration,
}

impl BackendAgentRunner {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            backend,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn with_cancel_grace(mut self, cancel_grace: Duration) -> Self {
        self.cancel_grace = cancel_grace;
        self
    }
}

#[async_trait]
impl AgentRunner for BackendAgentRunner {
    fn execute(&self, params: ExecuteParams) -> ExecutionHandle {
        let (tx, rx) = event_channel();
        let control = ExecutionControl::default();
        let work = drive(
            self.backend.clone(),
            params,
            tx,
            control.clone(),
            self.cancel_grace,
        );
        ExecutionHandle::new(rx, work, control)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.backend.close().await
    }
}

enum RunOutcome {
    Finished(BackendCompletion),
    Interrupted,
    Failed(anyhow::Error),
}

enum Step<T> {
    Interrupted,
    Ready(T),
}

async fn drive(
    backend: Arc<dyn AgentBackend>,
    params: ExecuteParams,
    events: EventSender<AgentEvent>,
    control: ExecutionControl,
    cancel_grace: Duration,
) {
    let mut normalizer = EventNormalizer::new(params.resume_session_id.is_some());
    let outcome = run(
        backend.as_ref(),
        params,
        &events,
        &control,
        &mut normalizer,
        cancel_grace,
    )
    .await;

    let last_assistant_message = normalizer.last_assistant_message();
    let completed = match outcome {
        RunOutcome::Finished(completion) => AgentEvent::Completed {
            success: completion.success,
            error: completion.error,
            last_assistant_message,
        },
        RunOutcome::Interrupted => AgentEvent::Completed {
            success: false,
            error: None,
            last_assistant_message,
        },
        RunOutcome::Failed(err) if control.is_cancelled() => {
            tracing::debug!(error = %err, "agent run failed after cancellation");
            AgentEvent::Completed {
                success: false,
                error: None,
                last_assistant_message,
            }
        }
        RunOutcome::Failed(err) => {
            let message = format!("{err:#}");
            tracing::warn!(error = %message, "agent run failed");
            events.push(AgentEvent::Error {
                message: message.clone(),
            });
            AgentEvent::Completed {
                success: false,
                error: Some(message),
                last_assistant_message,
            }
        }
    };
    events.push(completed);
    events.close();
}

async fn run(
    backend: &dyn AgentBackend,
    params: ExecuteParams,
    events: &EventSender<AgentEvent>,
    control: &ExecutionControl,
    normalizer: &mut EventNormalizer,
    cancel_grace: Duration,
) -> RunOutcome {
    let request = StartSessionRequest {
        prompt: params.prompt,
        project_path: params.project_path,
        resume_session_id: params.resume_session_id,
    };
    let started = tokio::select! {
        biased;
        _ = control.cancelled() => Step::Interrupted,
        started = backend.start_session(request) => Step::Ready(started),
    };
    let mut session = match started {
        Step::Interrupted => return RunOutcome::Interrupted,
        Step::Ready(Ok(session)) => session,
        Step::Ready(Err(err)) => return RunOutcome::Failed(err),
    };

    let outcome = consume(session.as_mut(), events, control, normalizer, cancel_grace).await;
    tracing::debug!(state = %session.state(), "releasing agent backend session");
    session.release().await;
    outcome
}

async fn consume(
    session: &mut dyn AgentBackendSession,
    events: &EventSender<AgentEvent>,
    control: &ExecutionControl,
    normalizer: &mut EventNormalizer,
    cancel_grace: Duration,
) -> RunOutcome {
    loop {
        let step = tokio::select! {
            biased;
            _ = control.cancelled() => Step::Interrupted,
            next = session.next_message() => Step::Ready(next),
        };
        match step {
            Step::Interrupted => return interrupt(session, control, cancel_grace).await,
            Step::Ready(Ok(Some(message))) => {
                for event in normalizer.normalize(message) {
                    events.push(event);
                }
            }
            Step::Ready(Ok(None)) => break,
            Step::Ready(Err(err)) => {
                if control.is_cancelled() {
                    return interrupt(session, control, cancel_grace).await;
                }
                return RunOutcome::Failed(err);
            }
        }
    }

    let completion = tokio::select! {
        biased;
        _ = control.cancelled() => Step::Interrupted,
        completion = session.wait_for_completion() => Step::Ready(completion),
    };
    match completion {
        Step::Interrupted => interrupt(session, control, cancel_grace).await,
        Step::Ready(completion) => RunOutcome::Finished(completion),
    }
}

/// Stops the session and waits, bounded, for it to settle. An abort issued
/// while waiting escalates immediately.
async fn interrupt(
    session: &mut dyn AgentBackendSession,
    control: &ExecutionControl,
    cancel_grace: Duration,
) -> RunOutcome {
    let mut aborted = control.is_aborted();
    let stopped = if aborted {
        session.abort().await
    } else {
        session.cancel().await
    };
    if let Err(err) = stopped {
        tracing::warn!(error = %err, aborted, "failed to stop agent backend session");
    }

    let deadline = tokio::time::Instant::now() + cancel_grace;
    loop {
        let waited = tokio::select! {
            biased;
            _ = control.aborted(), if !aborted => Step::Interrupted,
            waited = tokio::time::timeout_at(deadline, session.wait_for_completion()) => Step::Ready(waited),
        };
        match waited {
            Step::Interrupted => {
                aborted = true;
                if let Err(err) = session.abort().await {
                    tracing::warn!(error = %err, "failed to abort agent backend session");
                }
            }
            Step::Ready(Ok(_)) => break,
            Step::Ready(Err(_)) => {
                tracing::warn!(
                    grace_ms = cancel_grace.as_millis() as u64,
                    "agent backend did not complete after stop request"
                );
                if !aborted && let Err(err) = session.abort().await {
                    tracing::warn!(error = %err, "failed to abort agent backend session");
                }
                break;
            }
        }
    }
    RunOutcome::Interrupted
}
