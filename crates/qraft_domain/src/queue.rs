use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::{ExternalSessionId, PromptId, PromptStatus, QraftAiSessionId, WorktreeId};

pub const DEFAULT_MAX_CONCURRENT: usize = 1;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueueConfig {
    /// Running entries allowed per worktree.
    pub max_concurrent: usize,
    /// Waiting entries allowed per worktree. Submissions past this are rejected.
    pub max_queue_size: usize,
    /// `None` disables the per-run deadline.
    pub session_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            session_timeout: Some(DEFAULT_SESSION_TIMEOUT),
        }
    }
}

impl QueueConfig {
    pub fn normalized(self) -> Self {
        Self {
            max_concurrent: self.max_concurrent.max(1),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl QueueEntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Prompt status persisted when the entry reaches this state.
    pub fn prompt_status(self) -> PromptStatus {
        match self {
            Self::Queued => PromptStatus::Dispatching,
            Self::Running => PromptStatus::Dispatched,
            Self::Completed => PromptStatus::Completed,
            Self::Failed => PromptStatus::Failed,
            Self::Cancelled => PromptStatus::Cancelled,
        }
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live view of one in-flight prompt. Exists only while the prompt is queued
/// or running; the terminal state is published once and the entry dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub prompt_id: PromptId,
    pub worktree_id: WorktreeId,
    pub qraft_ai_session_id: Option<QraftAiSessionId>,
    pub status: QueueEntryStatus,
    pub current_activity: Option<String>,
    pub external_session_id: Option<ExternalSessionId>,
    pub error: Option<String>,
    pub created_at_unix_ms: u64,
}
