use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ExternalSessionId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Backend-agnostic event emitted by one agent execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    ClaudeSessionDetected {
        external_session_id: ExternalSessionId,
    },
    /// `content` is the full message aggregated so far, never a delta.
    Message {
        role: MessageRole,
        content: String,
    },
    ToolCall {
        tool_name: String,
        input: Value,
    },
    ToolResult {
        tool_name: String,
        output: Value,
        is_error: bool,
    },
    Error {
        message: String,
    },
    /// `None` clears the live activity line.
    Activity {
        #[serde(default)]
        activity: Option<String>,
    },
    Completed {
        success: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        last_assistant_message: Option<String>,
    },
}

impl AgentEvent {
    pub fn activity(text: impl Into<String>) -> Self {
        Self::Activity {
            activity: Some(text.into()),
        }
    }

    pub fn activity_cleared() -> Self {
        Self::Activity { activity: None }
    }

    pub fn assistant_message(content: impl Into<String>) -> Self {
        Self::Message {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
