use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const QUEUE_UPDATE_EVENT: &str = "queue:update";
pub const PROMPT_UPDATE_EVENT: &str = "prompt:update";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Pending,
    Dispatching,
    Dispatched,
    Completed,
    Failed,
    Cancelled,
}

/// Payload published through the broadcast sink on every queue entry change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBroadcast {
    pub id: String,
    pub truncated_message: String,
    pub status: QueueEntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: u64,
    pub worktree_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qraft_ai_session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSnapshot {
    pub id: String,
    pub prompt_text: String,
    pub description: String,
    pub context: Value,
    pub project_path: String,
    pub status: PromptStatus,
    pub dispatch_session_id: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntrySnapshot {
    pub prompt_id: String,
    pub worktree_id: String,
    #[serde(default)]
    pub qraft_ai_session_id: Option<String>,
    pub status: QueueEntryStatus,
    #[serde(default)]
    pub current_activity: Option<String>,
    #[serde(default)]
    pub external_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntrySnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromptRequest {
    pub prompt_text: String,
    pub project_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub qraft_ai_session_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPromptRequest {
    #[serde(default)]
    pub qraft_ai_session_id: Option<String>,
    #[serde(default)]
    pub resume_session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}
