pub mod agent;
mod env;
mod event_channel;
mod sqlite_store;
mod store;

#[cfg(test)]
mod test_support;

pub use env::{resolve_claude_exec, resolve_qraft_root, resolve_sqlite_path};
pub use event_channel::{EventReceiver, EventSender, event_channel};
pub use sqlite_store::{SqliteStore, SqliteStoreError};
pub use store::{PromptStore, SessionMappingStore};
