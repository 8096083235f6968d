use qraft_domain::{
    LocalPrompt, PromptStatus, QUEUE_MESSAGE_MAX_CHARS, QueueEntry, QueueEntryStatus,
    truncate_message,
};

pub(crate) fn map_queue_entry_status(status: QueueEntryStatus) -> qraft_api::QueueEntryStatus {
    match status {
        QueueEntryStatus::Queued => qraft_api::QueueEntryStatus::Queued,
        QueueEntryStatus::Running => qraft_api::QueueEntryStatus::Running,
        QueueEntryStatus::Completed => qraft_api::QueueEntryStatus::Completed,
        QueueEntryStatus::Failed => qraft_api::QueueEntryStatus::Failed,
        QueueEntryStatus::Cancelled => qraft_api::QueueEntryStatus::Cancelled,
    }
}

pub(crate) fn map_prompt_status(status: PromptStatus) -> qraft_api::PromptStatus {
    match status {
        PromptStatus::Pending => qraft_api::PromptStatus::Pending,
        PromptStatus::Dispatching => qraft_api::PromptStatus::Dispatching,
        PromptStatus::Dispatched => qraft_api::PromptStatus::Dispatched,
        PromptStatus::Completed => qraft_api::PromptStatus::Completed,
        PromptStatus::Failed => qraft_api::PromptStatus::Failed,
        PromptStatus::Cancelled => qraft_api::PromptStatus::Cancelled,
    }
}

pub(crate) fn prompt_snapshot(prompt: &LocalPrompt) -> qraft_api::PromptSnapshot {
    qraft_api::PromptSnapshot {
        id: prompt.id.as_str().to_owned(),
        prompt_text: prompt.prompt_text.clone(),
        description: prompt.description.clone(),
        context: prompt.context.clone(),
        project_path: prompt.project_path.to_string_lossy().into_owned(),
        status: map_prompt_status(prompt.status),
        dispatch_session_id: prompt
            .dispatch_session_id
            .as_ref()
            .map(|id| id.as_str().to_owned()),
        created_at: prompt.created_at_unix_ms,
        updated_at: prompt.updated_at_unix_ms,
        error: prompt.error.clone(),
    }
}

pub(crate) fn queue_entry_snapshot(entry: &QueueEntry) -> qraft_api::QueueEntrySnapshot {
    qraft_api::QueueEntrySnapshot {
        prompt_id: entry.prompt_id.as_str().to_owned(),
        worktree_id: entry.worktree_id.as_str().to_owned(),
        qraft_ai_session_id: entry
            .qraft_ai_session_id
            .as_ref()
            .map(|id| id.as_str().to_owned()),
        status: map_queue_entry_status(entry.status),
        current_activity: entry.current_activity.clone(),
        external_session_id: entry
            .external_session_id
            .as_ref()
            .map(|id| id.as_str().to_owned()),
        error: entry.error.clone(),
        created_at: entry.created_at_unix_ms,
    }
}

pub(crate) fn queue_broadcast(entry: &QueueEntry, prompt_text: &str) -> qraft_api::QueueBroadcast {
    let snapshot = queue_entry_snapshot(entry);
    qraft_api::QueueBroadcast {
        id: snapshot.prompt_id,
        truncated_message: truncate_message(prompt_text, QUEUE_MESSAGE_MAX_CHARS),
        status: snapshot.status,
        external_session_id: snapshot.external_session_id,
        current_activity: snapshot.current_activity,
        error: snapshot.error,
        created_at: snapshot.created_at,
        worktree_id: snapshot.worktree_id,
        qraft_ai_session_id: snapshot.qraft_ai_session_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qraft_domain::{ExternalSessionId, PromptId, QraftAiSessionId, WorktreeId};
    use serde_json::json;

    #[test]
    fn broadcast_payload_truncates_message_and_carries_ids() {
        let entry = QueueEntry {
            prompt_id: PromptId::from_string("p1"),
            worktree_id: WorktreeId::from_string("/repo"),
            qraft_ai_session_id: Some(QraftAiSessionId::from_string("qs_abc")),
            status: QueueEntryStatus::Running,
            current_activity: Some("Using Bash...".to_owned()),
            external_session_id: ExternalSessionId::parse(
                "123e4567-e89b-12d3-a456-426614174000",
            ),
            error: None,
            created_at_unix_ms: 7,
        };
        let payload = queue_broadcast(&entry, &"a".repeat(150));
        assert_eq!(payload.truncated_message.chars().count(), 103);
        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({
                "id": "p1",
                "truncatedMessage": format!("{}...", "a".repeat(100)),
                "status": "running",
                "externalSessionId": "123e4567-e89b-12d3-a456-426614174000",
                "currentActivity": "Using Bash...",
                "createdAt": 7,
                "worktreeId": "/repo",
                "qraftAiSessionId": "qs_abc",
            })
        );
    }

    #[test]
    fn every_status_has_a_wire_name() {
        for status in PromptStatus::ALL {
            let wire = serde_json::to_value(map_prompt_status(status)).expect("serialize");
            assert_eq!(wire, json!(status.as_str()));
        }
    }
}
