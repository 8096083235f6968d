use qraft_domain::{
    ExternalSessionId, LocalPrompt, NewPrompt, PromptId, PromptUpdate, QraftAiSessionId,
};

/// Durable prompt records. Every call is synchronous and returns once the
/// write is persisted.
pub trait PromptStore: Send + Sync {
    fn create(&self, prompt: NewPrompt) -> anyhow::Result<LocalPrompt>;

    fn get(&self, id: &PromptId) -> anyhow::Result<Option<LocalPrompt>>;

    /// Oldest first.
    fn list(&self) -> anyhow::Result<Vec<LocalPrompt>>;

    /// Fails with `SqliteStoreError::PromptNotFound` for unknown ids and with
    /// `PromptTransitionError` for a status change that moves backwards.
    fn update(&self, id: &PromptId, update: PromptUpdate) -> anyhow::Result<LocalPrompt>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &PromptId) -> anyhow::Result<bool>;

    /// Resets prompts left `dispatching`/`dispatched` by a crash back to
    /// `pending` and returns how many were reset.
    fn recover_interrupted(&self) -> anyhow::Result<usize>;
}

/// Conversation group to the latest external session it resolved to.
pub trait SessionMappingStore: Send + Sync {
    fn get_session_mapping(
        &self,
        qraft_ai_session_id: &QraftAiSessionId,
    ) -> anyhow::Result<Option<ExternalSessionId>>;

    fn set_session_mapping(
        &self,
        qraft_ai_session_id: &QraftAiSessionId,
        external_session_id: &ExternalSessionId,
    ) -> anyhow::Result<()>;
}
