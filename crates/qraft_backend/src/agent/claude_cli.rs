use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use qraft_domain::paths;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncReadExt as _, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::backend::{
    AgentBackend, AgentBackendSession, BackendCompletion, BackendMessage, BackendSessionState,
    StartSessionRequest,
};

const CLAUDE_ARGS: &[&str] = &[
    "--print",
    "--output-format",
    "stream-json",
    "--verbose",
    "--include-partial-messages",
    "--permission-mode",
    "bypassPermissions",
];

/// Runs each session as a `claude --print` child process and reads its
/// stream-json output.
#[derive(Clone, Debug)]
pub struct ClaudeCliBackend {
    exec: PathBuf,
}

impl ClaudeCliBackend {
    pub fn new(exec: impl Into<PathBuf>) -> Self {
        Self { exec: exec.into() }
    }

    fn command(&self, request: &StartSessionRequest) -> Command {
        let mut command = Command::new(&self.exec);
        command.current_dir(&request.project_path);
        command.args(CLAUDE_ARGS);
        if let Some(resume) = &request.resume_session_id {
            command.arg("--resume").arg(resume.as_str());
        }
        command.arg(&request.prompt);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl AgentBackend for ClaudeCliBackend {
    async fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> anyhow::Result<Box<dyn AgentBackendSession>> {
        let mut child = self.command(&request).spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                anyhow!(
                    "missing claude executable ({}): install Claude Code and ensure it is available on PATH (or set {} to an absolute path)",
                    self.exec.display(),
                    paths::QRAFT_CLAUDE_BIN_ENV
                )
            } else {
                anyhow!(err).context("failed to spawn claude")
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("missing stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("missing stderr"))?;

        tracing::debug!(
            exec = %self.exec.display(),
            project_path = %request.project_path.display(),
            resume = request.resume_session_id.is_some(),
            "spawned claude"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut tool_names = HashMap::new();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        for message in classify_stream_json_line(&mut tool_names, &line) {
                            if tx.send(Ok(message)).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(err) => {
                        let _ = tx.send(Err(
                            anyhow!(err).context("failed to read claude stdout line")
                        ));
                        return;
                    }
                }
            }
        });
        let stderr_task = tokio::spawn(read_to_string(stderr));

        Ok(Box::new(ClaudeCliSession {
            child,
            messages: rx,
            stdout_task: Some(stdout_task),
            stderr_task: Some(stderr_task),
            completion: None,
            state: BackendSessionState::Starting,
            stop_requested: false,
            released: false,
        }))
    }
}

async fn read_to_string<R: AsyncRead + Unpin>(input: R) -> String {
    let mut buf = Vec::new();
    let mut reader = BufReader::new(input);
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).to_string()
}

struct ClaudeCliSession {
    child: Child,
    messages: mpsc::UnboundedReceiver<anyhow::Result<BackendMessage>>,
    stdout_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<String>>,
    completion: Option<BackendCompletion>,
    state: BackendSessionState,
    stop_requested: bool,
    released: bool,
}

impl ClaudeCliSession {
    async fn stderr_text(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        }
    }

    fn kill(&mut self) -> anyhow::Result<()> {
        self.stop_requested = true;
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }
        self.child.start_kill().context("failed to kill claude")
    }
}

#[async_trait]
impl AgentBackendSession for ClaudeCliSession {
    async fn next_message(&mut self) -> anyhow::Result<Option<BackendMessage>> {
        match self.messages.recv().await {
            Some(Ok(message)) => {
                if self.state == BackendSessionState::Starting {
                    self.state = BackendSessionState::Running;
                }
                Ok(Some(message))
            }
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn wait_for_completion(&mut self) -> BackendCompletion {
        if let Some(completion) = &self.completion {
            return completion.clone();
        }

        let status = self.child.wait().await;
        let stderr_text = self.stderr_text().await;
        let completion = match status {
            Ok(status) if status.success() => BackendCompletion::succeeded(),
            Ok(status) => {
                let message = stderr_text.trim();
                if message.is_empty() {
                    BackendCompletion::failed(format!("claude exited with status {status}"))
                } else {
                    BackendCompletion::failed(message)
                }
            }
            Err(err) => BackendCompletion::failed(format!("failed to wait for claude: {err}")),
        };

        self.state = if self.stop_requested {
            BackendSessionState::Cancelled
        } else if completion.success {
            BackendSessionState::Completed
        } else {
            BackendSessionState::Failed
        };
        self.completion = Some(completion.clone());
        completion
    }

    fn state(&self) -> BackendSessionState {
        self.state
    }

    async fn cancel(&mut self) -> anyhow::Result<()> {
        // The CLI has no graceful stop channel; a cancelled print run is killed.
        self.kill()
    }

    async fn abort(&mut self) -> anyhow::Result<()> {
        self.kill()
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if self.completion.is_none() {
            if let Err(err) = self.kill() {
                tracing::warn!(error = %err, "failed to kill claude during release");
            }
            let _ = self.child.wait().await;
        }
        if let Some(task) = self.stdout_task.take() {
            task.abort();
            let _ = task.await;
        }
        let _ = self.stderr_text().await;
        self.messages.close();
    }
}

fn content_blocks(payload: &Value) -> &[Value] {
    payload
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn error_text(payload: &Value) -> Option<String> {
    let error = payload.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .or_else(|| payload.get("message").and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

/// Splits one stream-json line into tagged backend messages. Blank and
/// non-JSON lines produce nothing. `tool_names` maps `tool_use` ids to tool
/// names so that results can be labelled.
pub(crate) fn classify_stream_json_line(
    tool_names: &mut HashMap<String, String>,
    line: &str,
) -> Vec<BackendMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let payload: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };

    let type_name = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut out = Vec::new();
    match type_name.as_str() {
        "assistant" => {
            let tool_calls: Vec<Value> = content_blocks(&payload)
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
                .cloned()
                .collect();
            for block in &tool_calls {
                if let (Some(id), Some(name)) = (
                    block.get("id").and_then(Value::as_str),
                    block.get("name").and_then(Value::as_str),
                ) {
                    tool_names.insert(id.to_owned(), name.to_owned());
                }
            }
            out.push(BackendMessage::Message(payload));
            out.extend(tool_calls.into_iter().map(BackendMessage::ToolCall));
        }
        "user" => {
            for block in content_blocks(&payload) {
                if block.get("type").and_then(Value::as_str) != Some("tool_result") {
                    continue;
                }
                let mut block = block.clone();
                let name = block
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .and_then(|id| tool_names.get(id))
                    .cloned();
                if let (Some(name), Some(obj)) = (name, block.as_object_mut()) {
                    obj.insert("toolName".to_owned(), Value::String(name));
                }
                out.push(BackendMessage::ToolResult(block));
            }
        }
        "error" => {
            let message = error_text(&payload).unwrap_or_else(|| trimmed.to_owned());
            out.push(BackendMessage::Error(message));
        }
        "result" => {
            let subtype = payload
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned();
            let is_error = payload
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let failure = if is_error || (!subtype.is_empty() && subtype != "success") {
                Some(
                    payload
                        .get("result")
                        .and_then(Value::as_str)
                        .map(ToOwned::to_owned)
                        .or_else(|| error_text(&payload))
                        .unwrap_or_else(|| format!("claude reported {subtype}")),
                )
            } else {
                None
            };
            out.push(BackendMessage::Message(payload));
            if let Some(message) = failure {
                out.push(BackendMessage::Error(message));
            }
        }
        _ => out.push(BackendMessage::Message(payload)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(tool_names: &mut HashMap<String, String>, line: &str) -> Vec<BackendMessage> {
        classify_stream_json_line(tool_names, line)
    }

    #[test]
    fn blank_and_non_json_lines_are_dropped() {
        let mut tools = HashMap::new();
        assert!(classify(&mut tools, "   ").is_empty());
        assert!(classify(&mut tools, "warning: something").is_empty());
    }

    #[test]
    fn system_init_is_passed_through_as_message() {
        let mut tools = HashMap::new();
        let out = classify(
            &mut tools,
            r#"{"type":"system","subtype":"init","session_id":"123e4567-e89b-12d3-a456-426614174000"}"#,
        );
        assert!(matches!(
            out.as_slice(),
            [BackendMessage::Message(raw)] if raw["session_id"] == "123e4567-e89b-12d3-a456-426614174000"
        ));
    }

    #[test]
    fn tool_use_and_tool_result_are_split_out_and_named() {
        let mut tools = HashMap::new();
        let out = classify(
            &mut tools,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Running"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#,
        );
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], BackendMessage::Message(_)));
        assert_eq!(
            out[1],
            BackendMessage::ToolCall(
                json!({"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}})
            )
        );

        let out = classify(
            &mut tools,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok","is_error":false}]}}"#,
        );
        assert_eq!(
            out,
            vec![BackendMessage::ToolResult(json!({
                "type": "tool_result",
                "tool_use_id": "t1",
                "content": "ok",
                "is_error": false,
                "toolName": "Bash",
            }))]
        );
    }

    #[test]
    fn error_payloads_become_errors() {
        let mut tools = HashMap::new();
        let out = classify(
            &mut tools,
            r#"{"type":"error","error":{"message":"overloaded"}}"#,
        );
        assert_eq!(out, vec![BackendMessage::Error("overloaded".to_owned())]);
    }

    #[test]
    fn failed_result_reports_error_after_message() {
        let mut tools = HashMap::new();
        let out = classify(
            &mut tools,
            r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#,
        );
        assert!(matches!(&out[0], BackendMessage::Message(_)));
        assert_eq!(
            out[1],
            BackendMessage::Error("claude reported error_max_turns".to_owned())
        );

        let out = classify(
            &mut tools,
            r#"{"type":"result","subtype":"success","result":"Done"}"#,
        );
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn missing_executable_reports_actionable_error() {
        let backend = ClaudeCliBackend::new("/definitely/not/here/claude");
        let err = match backend
            .start_session(StartSessionRequest {
                prompt: "hi".to_owned(),
                project_path: std::env::temp_dir(),
                resume_session_id: None,
            })
            .await
        {
            Ok(_) => panic!("spawn should fail"),
            Err(err) => err,
        };
        let text = err.to_string();
        assert!(text.contains("missing claude executable"), "{text}");
        assert!(text.contains(paths::QRAFT_CLAUDE_BIN_ENV), "{text}");
    }

    #[cfg(unix)]
    fn fake_claude(test_name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;

        let mut dir = std::env::temp_dir();
        dir.push("qraft-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{test_name}-{}.sh", std::process::id()));
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_fake_cli_to_completion() {
        let exec = fake_claude(
            "runs_fake_cli_to_completion",
            r#"echo '{"type":"system","subtype":"init","session_id":"123e4567-e89b-12d3-a456-426614174000"}'
echo 'not json'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"Hello"}]}}'
echo '{"type":"result","subtype":"success","result":"Hello"}'"#,
        );
        let backend = ClaudeCliBackend::new(&exec);
        let mut session = backend
            .start_session(StartSessionRequest {
                prompt: "hi".to_owned(),
                project_path: std::env::temp_dir(),
                resume_session_id: None,
            })
            .await
            .unwrap();

        let mut messages = Vec::new();
        while let Some(message) = session.next_message().await.unwrap() {
            messages.push(message);
        }
        assert_eq!(messages.len(), 3);
        assert_eq!(session.state(), BackendSessionState::Running);

        let completion = session.wait_for_completion().await;
        assert_eq!(completion, BackendCompletion::succeeded());
        assert_eq!(session.state(), BackendSessionState::Completed);
        session.release().await;
        session.release().await;
        let _ = std::fs::remove_file(exec);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_uses_stderr_as_error() {
        let exec = fake_claude(
            "non_zero_exit_uses_stderr_as_error",
            "echo 'bad flag' >&2\nexit 2",
        );
        let backend = ClaudeCliBackend::new(&exec);
        let mut session = backend
            .start_session(StartSessionRequest {
                prompt: "hi".to_owned(),
                project_path: std::env::temp_dir(),
                resume_session_id: None,
            })
            .await
            .unwrap();
        assert!(session.next_message().await.unwrap().is_none());
        let completion = session.wait_for_completion().await;
        assert_eq!(completion, BackendCompletion::failed("bad flag"));
        assert_eq!(session.state(), BackendSessionState::Failed);
        session.release().await;
        let _ = std::fs::remove_file(exec);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_kills_a_running_cli() {
        let exec = fake_claude("cancel_kills_a_running_cli", "exec sleep 30");
        let backend = ClaudeCliBackend::new(&exec);
        let mut session = backend
            .start_session(StartSessionRequest {
                prompt: "hi".to_owned(),
                project_path: std::env::temp_dir(),
                resume_session_id: None,
            })
            .await
            .unwrap();
        session.cancel().await.unwrap();
        let completion = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            session.wait_for_completion(),
        )
        .await
        .expect("killed child should exit");
        assert!(!completion.success);
        assert_eq!(session.state(), BackendSessionState::Cancelled);
        session.release().await;
        let _ = std::fs::remove_file(exec);
    }
}
