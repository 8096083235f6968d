mod backend;
mod claude_cli;
mod normalize;
mod offline;
mod runner;

#[cfg(test)]
mod testing;

pub use backend::{
    AgentBackend, AgentBackendSession, BackendCompletion, BackendMessage, BackendSessionState,
    StartSessionRequest,
};
pub use claude_cli::ClaudeCliBackend;
pub use normalize::extract_session_id;
pub use offline::OfflineAgentRunner;
pub use runner::{
    AgentRunner, BackendAgentRunner, DEFAULT_CANCEL_GRACE, ExecuteParams, ExecutionControl,
    ExecutionHandle,
};
