use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::{PromptId, QraftAiSessionId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Pending,
    Dispatching,
    Dispatched,
    Completed,
    Failed,
    Cancelled,
}

impl PromptStatus {
    pub const ALL: [PromptStatus; 6] = [
        PromptStatus::Pending,
        PromptStatus::Dispatching,
        PromptStatus::Dispatched,
        PromptStatus::Completed,
        PromptStatus::Failed,
        PromptStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    fn stage(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Dispatching => 1,
            Self::Dispatched => 2,
            Self::Completed | Self::Failed | Self::Cancelled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.stage() == 3
    }

    /// Left behind by a crash: the queue owned the prompt but never finished it.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Dispatching | Self::Dispatched)
    }

    /// Transitions only move forward along
    /// pending → dispatching → dispatched → {completed, failed, cancelled}.
    /// Forward skips are allowed (a queued prompt may be cancelled before it runs).
    pub fn can_transition_to(self, next: PromptStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.stage() > self.stage()
    }
}

impl fmt::Display for PromptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PromptTransitionError {
    pub from: PromptStatus,
    pub to: PromptStatus,
}

impl fmt::Display for PromptTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid prompt status transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for PromptTransitionError {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalPrompt {
    pub id: PromptId,
    pub prompt_text: String,
    pub description: String,
    pub context: Value,
    pub project_path: PathBuf,
    pub status: PromptStatus,
    pub dispatch_session_id: Option<QraftAiSessionId>,
    pub created_at_unix_ms: u64,
    pub updated_at_unix_ms: u64,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPrompt {
    pub prompt_text: String,
    pub description: String,
    pub context: Value,
    pub project_path: PathBuf,
    pub dispatch_session_id: Option<QraftAiSessionId>,
}

impl NewPrompt {
    pub fn new(prompt_text: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            description: String::new(),
            context: Value::Object(Default::default()),
            project_path: project_path.into(),
            dispatch_session_id: None,
        }
    }

    pub fn into_prompt(self, id: PromptId, now_unix_ms: u64) -> LocalPrompt {
        LocalPrompt {
            id,
            prompt_text: self.prompt_text,
            description: self.description,
            context: self.context,
            project_path: self.project_path,
            status: PromptStatus::Pending,
            dispatch_session_id: self.dispatch_session_id,
            created_at_unix_ms: now_unix_ms,
            updated_at_unix_ms: now_unix_ms,
            error: None,
        }
    }
}

/// Partial update. `error: Some(None)` clears a previous error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptUpdate {
    pub status: Option<PromptStatus>,
    pub dispatch_session_id: Option<QraftAiSessionId>,
    pub error: Option<Option<String>>,
}

impl PromptUpdate {
    pub fn status(status: PromptStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_dispatch_session_id(mut self, id: QraftAiSessionId) -> Self {
        self.dispatch_session_id = Some(id);
        self
    }
}

impl LocalPrompt {
    pub fn apply_update(
        &mut self,
        update: PromptUpdate,
        now_unix_ms: u64,
    ) -> Result<(), PromptTransitionError> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(PromptTransitionError {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if let Some(id) = update.dispatch_session_id {
            self.dispatch_session_id = Some(id);
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        self.updated_at_unix_ms = now_unix_ms;
        Ok(())
    }
}
