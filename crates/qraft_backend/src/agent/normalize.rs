use qraft_domain::{AgentEvent, ExternalSessionId};
use serde_json::{Map, Value};

use super::backend::BackendMessage;

const UNKNOWN_TOOL: &str = "unknown";

type SessionIdExtractor = fn(&Value) -> Option<&str>;

fn top_level_camel(raw: &Value) -> Option<&str> {
    str_at(raw, &["sessionId"])
}

fn top_level_snake(raw: &Value) -> Option<&str> {
    str_at(raw, &["session_id"])
}

fn message_camel(raw: &Value) -> Option<&str> {
    str_at(raw, &["message", "sessionId"])
}

fn message_snake(raw: &Value) -> Option<&str> {
    str_at(raw, &["message", "session_id"])
}

fn result_camel(raw: &Value) -> Option<&str> {
    str_at(raw, &["result", "sessionId"])
}

fn result_snake(raw: &Value) -> Option<&str> {
    str_at(raw, &["result", "session_id"])
}

/// Tried in order; the first UUID-shaped candidate wins.
const SESSION_ID_EXTRACTORS: &[SessionIdExtractor] = &[
    top_level_camel,
    top_level_snake,
    message_camel,
    message_snake,
    result_camel,
    result_snake,
];

fn str_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = raw;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str()
}

pub fn extract_session_id(raw: &Value) -> Option<ExternalSessionId> {
    SESSION_ID_EXTRACTORS
        .iter()
        .filter_map(|extract| extract(raw))
        .find_map(ExternalSessionId::parse)
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

fn first_present(raw: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .find_map(|key| raw.get(*key).filter(|v| !v.is_null()))
        .cloned()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Incremental text from a streamed payload, either wrapped in an `event`
/// envelope or bare.
fn text_delta(raw: &Value) -> Option<&str> {
    let delta = raw
        .get("event")
        .and_then(|event| event.get("delta"))
        .or_else(|| raw.get("delta"))?;
    if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
        return None;
    }
    delta.get("text").and_then(Value::as_str)
}

/// Full text of an atomic assistant message: a bare string, or an
/// `assistant` payload whose content is a string or a list of text blocks.
fn whole_assistant_text(raw: &Value) -> Option<String> {
    if let Some(text) = raw.as_str() {
        return Some(text.to_owned());
    }
    if raw.get("type").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    let content = raw
        .get("message")
        .and_then(|message| message.get("content"))
        .or_else(|| raw.get("content"))?;
    if let Some(text) = content.as_str() {
        return Some(text.to_owned());
    }
    let blocks = content.as_array()?;
    let texts: Vec<&str> = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    Some(texts.join("\n"))
}

/// Turns raw backend messages into `AgentEvent`s for one execution.
pub(crate) struct EventNormalizer {
    detect_session: bool,
    buffer: String,
}

impl EventNormalizer {
    pub(crate) fn new(resuming: bool) -> Self {
        Self {
            detect_session: !resuming,
            buffer: String::new(),
        }
    }

    pub(crate) fn last_assistant_message(&self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.clone())
        }
    }

    pub(crate) fn normalize(&mut self, message: BackendMessage) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        match message {
            BackendMessage::Message(raw) => {
                if self.detect_session
                    && let Some(external_session_id) = extract_session_id(&raw)
                {
                    self.detect_session = false;
                    out.push(AgentEvent::ClaudeSessionDetected {
                        external_session_id,
                    });
                }

                if let Some(delta) = text_delta(&raw) {
                    if !delta.is_empty() {
                        self.buffer.push_str(delta);
                        self.push_message(&mut out);
                    }
                } else if let Some(text) = whole_assistant_text(&raw)
                    && !text.is_empty()
                {
                    self.buffer = text;
                    self.push_message(&mut out);
                }
            }
            BackendMessage::ToolCall(raw) => {
                let tool_name = first_string(&raw, &["name", "toolName", "tool_name"])
                    .unwrap_or_else(|| UNKNOWN_TOOL.to_owned());
                let input = first_present(&raw, &["input"]).unwrap_or_else(empty_object);
                let activity = format!("Using {tool_name}...");
                out.push(AgentEvent::ToolCall { tool_name, input });
                out.push(AgentEvent::activity(activity));
            }
            BackendMessage::ToolResult(raw) => {
                let tool_name = first_string(&raw, &["toolName", "tool_name", "name"])
                    .unwrap_or_else(|| UNKNOWN_TOOL.to_owned());
                let output =
                    first_present(&raw, &["output", "content", "result"]).unwrap_or_else(empty_object);
                let is_error = ["isError", "is_error"]
                    .iter()
                    .find_map(|key| raw.get(*key).and_then(Value::as_bool))
                    .unwrap_or(false);
                let activity = format!("Processing {tool_name} result...");
                out.push(AgentEvent::ToolResult {
                    tool_name,
                    output,
                    is_error,
                });
                out.push(AgentEvent::activity(activity));
            }
            BackendMessage::Error(message) => out.push(AgentEvent::Error { message }),
        }
        out
    }

    fn push_message(&self, out: &mut Vec<AgentEvent>) {
        out.push(AgentEvent::assistant_message(self.buffer.clone()));
        out.push(AgentEvent::activity_cleared());
    }
}
