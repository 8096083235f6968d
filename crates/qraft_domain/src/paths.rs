use std::path::{Path, PathBuf};

pub const QRAFT_ROOT_ENV: &str = "QRAFT_ROOT";
pub const QRAFT_CLAUDE_BIN_ENV: &str = "QRAFT_CLAUDE_BIN";
pub const QRAFT_SERVER_ADDR_ENV: &str = "QRAFT_SERVER_ADDR";
pub const QRAFT_AGENT_BACKEND_ENV: &str = "QRAFT_AGENT_BACKEND";
pub const QRAFT_MAX_CONCURRENT_ENV: &str = "QRAFT_MAX_CONCURRENT";
pub const QRAFT_MAX_QUEUE_SIZE_ENV: &str = "QRAFT_MAX_QUEUE_SIZE";
pub const QRAFT_SESSION_TIMEOUT_MS_ENV: &str = "QRAFT_SESSION_TIMEOUT_MS";

pub fn sqlite_path(qraft_root: &Path) -> PathBuf {
    qraft_root.join("qraft.db")
}
