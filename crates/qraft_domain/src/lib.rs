mod ids;
pub use ids::{ExternalSessionId, PromptId, WorktreeId};

mod session_identity;
pub use session_identity::{QraftAiSessionId, fnv1a_32};

mod agent_event;
pub use agent_event::{AgentEvent, MessageRole};

mod prompt;
pub use prompt::{LocalPrompt, NewPrompt, PromptStatus, PromptTransitionError, PromptUpdate};

mod queue;
pub use queue::{
    DEFAULT_MAX_CONCURRENT, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_SESSION_TIMEOUT, QueueConfig,
    QueueEntry, QueueEntryStatus,
};

pub mod paths;
pub mod time;

pub const QUEUE_MESSAGE_MAX_CHARS: usize = 100;

/// Truncates on char boundaries and marks the cut with `...`.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
