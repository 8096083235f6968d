use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::backend::{
    AgentBackend, AgentBackendSession, BackendCompletion, BackendMessage, BackendSessionState,
    StartSessionRequest,
};

#[derive(Clone, Debug)]
pub(crate) enum ScriptedStep {
    Message(BackendMessage),
    Fail(String),
    /// Parks `next_message` until the session is cancelled or aborted.
    BlockUntilCancelled,
}

#[derive(Default)]
struct Stats {
    starts: AtomicUsize,
    cancels: AtomicUsize,
    aborts: AtomicUsize,
    releases: AtomicUsize,
    closes: AtomicUsize,
    last_request: Mutex<Option<StartSessionRequest>>,
}

/// Replays a fixed script per session and counts lifecycle calls.
#[derive(Clone)]
pub(crate) struct ScriptedBackend {
    steps: Vec<ScriptedStep>,
    completion: BackendCompletion,
    honor_cancel: bool,
    start_error: Option<String>,
    stats: Arc<Stats>,
}

impl ScriptedBackend {
    pub(crate) fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps,
            completion: BackendCompletion::succeeded(),
            honor_cancel: true,
            start_error: None,
            stats: Arc::new(Stats::default()),
        }
    }

    pub(crate) fn failing_start(message: &str) -> Self {
        Self {
            start_error: Some(message.to_owned()),
            ..Self::new(Vec::new())
        }
    }

    /// Cancel is recorded but has no effect; only abort stops the session.
    pub(crate) fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }

    pub(crate) fn with_completion(mut self, completion: BackendCompletion) -> Self {
        self.completion = completion;
        self
    }

    pub(crate) fn start_count(&self) -> usize {
        self.stats.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.stats.cancels.load(Ordering::SeqCst)
    }

    pub(crate) fn abort_count(&self) -> usize {
        self.stats.aborts.load(Ordering::SeqCst)
    }

    pub(crate) fn release_count(&self) -> usize {
        self.stats.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<StartSessionRequest> {
        self.stats
            .last_request
            .lock()
            .expect("stats lock poisoned")
            .clone()
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> anyhow::Result<Box<dyn AgentBackendSession>> {
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        *self.stats.last_request.lock().expect("stats lock poisoned") = Some(request);
        if let Some(message) = &self.start_error {
            return Err(anyhow!(message.clone()));
        }
        Ok(Box::new(ScriptedSession {
            steps: self.steps.clone().into(),
            completion: self.completion.clone(),
            honor_cancel: self.honor_cancel,
            cancel_requested: false,
            stop: CancellationToken::new(),
            state: BackendSessionState::Running,
            stats: self.stats.clone(),
        }))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedSession {
    steps: VecDeque<ScriptedStep>,
    completion: BackendCompletion,
    honor_cancel: bool,
    cancel_requested: bool,
    stop: CancellationToken,
    state: BackendSessionState,
    stats: Arc<Stats>,
}

#[async_trait]
impl AgentBackendSession for ScriptedSession {
    async fn next_message(&mut self) -> anyhow::Result<Option<BackendMessage>> {
        match self.steps.pop_front() {
            None => Ok(None),
            Some(ScriptedStep::Message(message)) => Ok(Some(message)),
            Some(ScriptedStep::Fail(message)) => {
                self.state = BackendSessionState::Failed;
                Err(anyhow!(message))
            }
            Some(ScriptedStep::BlockUntilCancelled) => {
                self.stop.cancelled().await;
                Ok(None)
            }
        }
    }

    async fn wait_for_completion(&mut self) -> BackendCompletion {
        if self.cancel_requested && !self.stop.is_cancelled() {
            self.stop.cancelled().await;
        }
        if self.stop.is_cancelled() {
            self.state = BackendSessionState::Cancelled;
            return BackendCompletion::failed("stopped");
        }
        self.state = if self.completion.success {
            BackendSessionState::Completed
        } else {
            BackendSessionState::Failed
        };
        self.completion.clone()
    }

    fn state(&self) -> BackendSessionState {
        self.state
    }

    async fn cancel(&mut self) -> anyhow::Result<()> {
        self.stats.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancel_requested = true;
        if self.honor_cancel {
            self.stop.cancel();
        }
        Ok(())
    }

    async fn abort(&mut self) -> anyhow::Result<()> {
        self.stats.aborts.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
        Ok(())
    }

    async fn release(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}
