use anyhow::{Context as _, anyhow};
use qraft_domain::{
    ExternalSessionId, LocalPrompt, NewPrompt, PromptId, PromptStatus, PromptUpdate,
    QraftAiSessionId, time::now_unix_millis,
};
use rusqlite::{Connection, OptionalExtension as _, Row, params};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::store::{PromptStore, SessionMappingStore};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SqliteStoreError {
    PromptNotFound,
}

impl std::fmt::Display for SqliteStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqliteStoreError::PromptNotFound => write!(f, "prompt not found"),
        }
    }
}

impl std::error::Error for SqliteStoreError {}

const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/migrations/0001_prompts.sql"
        )),
    ),
    (
        2,
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/migrations/0002_session_mappings.sql"
        )),
    ),
];

const PROMPT_COLUMNS: &str = "id, prompt_text, description, context_json, project_path, status,
     dispatch_session_id, error, created_at, updated_at";

/// Handle to a SQLite database owned by a dedicated worker thread. Cheap to
/// clone; every call blocks until the worker replies.
#[derive(Clone)]
pub struct SqliteStore {
    tx: mpsc::Sender<DbCommand>,
}

enum DbCommand {
    CreatePrompt {
        prompt: Box<NewPrompt>,
        reply: mpsc::Sender<anyhow::Result<LocalPrompt>>,
    },
    GetPrompt {
        id: PromptId,
        reply: mpsc::Sender<anyhow::Result<Option<LocalPrompt>>>,
    },
    ListPrompts {
        reply: mpsc::Sender<anyhow::Result<Vec<LocalPrompt>>>,
    },
    UpdatePrompt {
        id: PromptId,
        update: PromptUpdate,
        reply: mpsc::Sender<anyhow::Result<LocalPrompt>>,
    },
    DeletePrompt {
        id: PromptId,
        reply: mpsc::Sender<anyhow::Result<bool>>,
    },
    RecoverInterrupted {
        reply: mpsc::Sender<anyhow::Result<usize>>,
    },
    GetSessionMapping {
        qraft_ai_session_id: QraftAiSessionId,
        reply: mpsc::Sender<anyhow::Result<Option<ExternalSessionId>>>,
    },
    SetSessionMapping {
        qraft_ai_session_id: QraftAiSessionId,
        external_session_id: ExternalSessionId,
        reply: mpsc::Sender<anyhow::Result<()>>,
    },
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<DbCommand>();

        std::thread::Builder::new()
            .name("qraft-sqlite".to_owned())
            .spawn(move || {
                let mut db = SqliteDatabase::open(&db_path);
                while let Ok(cmd) = rx.recv() {
                    match (&mut db, cmd) {
                        (Ok(db), DbCommand::CreatePrompt { prompt, reply }) => {
                            let _ = reply.send(db.create_prompt(*prompt));
                        }
                        (Ok(db), DbCommand::GetPrompt { id, reply }) => {
                            let _ = reply.send(db.get_prompt(&id));
                        }
                        (Ok(db), DbCommand::ListPrompts { reply }) => {
                            let _ = reply.send(db.list_prompts());
                        }
                        (Ok(db), DbCommand::UpdatePrompt { id, update, reply }) => {
                            let _ = reply.send(db.update_prompt(&id, update));
                        }
                        (Ok(db), DbCommand::DeletePrompt { id, reply }) => {
                            let _ = reply.send(db.delete_prompt(&id));
                        }
                        (Ok(db), DbCommand::RecoverInterrupted { reply }) => {
                            let _ = reply.send(db.recover_interrupted());
                        }
                        (
                            Ok(db),
                            DbCommand::GetSessionMapping {
                                qraft_ai_session_id,
                                reply,
                            },
                        ) => {
                            let _ = reply.send(db.get_session_mapping(&qraft_ai_session_id));
                        }
                        (
                            Ok(db),
                            DbCommand::SetSessionMapping {
                                qraft_ai_session_id,
                                external_session_id,
                                reply,
                            },
                        ) => {
                            let _ = reply.send(
                                db.set_session_mapping(&qraft_ai_session_id, &external_session_id),
                            );
                        }
                        (Err(err), cmd) => {
                            respond_db_open_error(err, cmd);
                        }
                    }
                }
            })
            .context("failed to spawn sqlite worker thread")?;

        Ok(Self { tx })
    }

    fn request<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<anyhow::Result<T>>) -> DbCommand,
    ) -> anyhow::Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(build(reply_tx))
            .context("sqlite worker is not running")?;
        reply_rx.recv().context("sqlite worker terminated")?
    }
}

impl PromptStore for SqliteStore {
    fn create(&self, prompt: NewPrompt) -> anyhow::Result<LocalPrompt> {
        self.request(|reply| DbCommand::CreatePrompt {
            prompt: Box::new(prompt),
            reply,
        })
    }

    fn get(&self, id: &PromptId) -> anyhow::Result<Option<LocalPrompt>> {
        self.request(|reply| DbCommand::GetPrompt {
            id: id.clone(),
            reply,
        })
    }

    fn list(&self) -> anyhow::Result<Vec<LocalPrompt>> {
        self.request(|reply| DbCommand::ListPrompts { reply })
    }

    fn update(&self, id: &PromptId, update: PromptUpdate) -> anyhow::Result<LocalPrompt> {
        self.request(|reply| DbCommand::UpdatePrompt {
            id: id.clone(),
            update,
            reply,
        })
    }

    fn delete(&self, id: &PromptId) -> anyhow::Result<bool> {
        self.request(|reply| DbCommand::DeletePrompt {
            id: id.clone(),
            reply,
        })
    }

    fn recover_interrupted(&self) -> anyhow::Result<usize> {
        self.request(|reply| DbCommand::RecoverInterrupted { reply })
    }
}

impl SessionMappingStore for SqliteStore {
    fn get_session_mapping(
        &self,
        qraft_ai_session_id: &QraftAiSessionId,
    ) -> anyhow::Result<Option<ExternalSessionId>> {
        self.request(|reply| DbCommand::GetSessionMapping {
            qraft_ai_session_id: qraft_ai_session_id.clone(),
            reply,
        })
    }

    fn set_session_mapping(
        &self,
        qraft_ai_session_id: &QraftAiSessionId,
        external_session_id: &ExternalSessionId,
    ) -> anyhow::Result<()> {
        self.request(|reply| DbCommand::SetSessionMapping {
            qraft_ai_session_id: qraft_ai_session_id.clone(),
            external_session_id: external_session_id.clone(),
            reply,
        })
    }
}

fn respond_db_open_error(err: &anyhow::Error, cmd: DbCommand) {
    let message = format!("{err:#}");
    match cmd {
        DbCommand::CreatePrompt { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::GetPrompt { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::ListPrompts { reply } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::UpdatePrompt { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::DeletePrompt { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::RecoverInterrupted { reply } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::GetSessionMapping { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
        DbCommand::SetSessionMapping { reply, .. } => {
            let _ = reply.send(Err(anyhow!(message)));
        }
    }
}

struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut conn = Connection::open(db_path)
            .with_context(|| format!("failed to open sqlite db {}", db_path.display()))?;

        configure_connection(&mut conn).context("failed to configure sqlite connection")?;
        apply_migrations(&mut conn).context("failed to apply sqlite migrations")?;

        Ok(Self { conn })
    }

    fn create_prompt(&mut self, prompt: NewPrompt) -> anyhow::Result<LocalPrompt> {
        let prompt = prompt.into_prompt(PromptId::generate(), now_unix_millis());
        let context_json =
            serde_json::to_string(&prompt.context).context("failed to encode prompt context")?;
        self.conn
            .execute(
                "INSERT INTO prompts (
                    id, prompt_text, description, context_json, project_path, status,
                    dispatch_session_id, error, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    prompt.id.as_str(),
                    prompt.prompt_text,
                    prompt.description,
                    context_json,
                    prompt.project_path.to_string_lossy(),
                    prompt.status.as_str(),
                    prompt.dispatch_session_id.as_ref().map(|id| id.as_str()),
                    prompt.error,
                    prompt.created_at_unix_ms as i64,
                    prompt.updated_at_unix_ms as i64,
                ],
            )
            .context("failed to insert prompt")?;
        Ok(prompt)
    }

    fn get_prompt(&mut self, id: &PromptId) -> anyhow::Result<Option<LocalPrompt>> {
        load_prompt(&self.conn, id)
    }

    fn list_prompts(&mut self) -> anyhow::Result<Vec<LocalPrompt>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], prompt_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_prompt(row?)?);
        }
        Ok(out)
    }

    fn update_prompt(
        &mut self,
        id: &PromptId,
        update: PromptUpdate,
    ) -> anyhow::Result<LocalPrompt> {
        let tx = self.conn.transaction()?;
        let mut prompt = load_prompt(&tx, id)?.ok_or(SqliteStoreError::PromptNotFound)?;
        prompt.apply_update(update, now_unix_millis())?;
        tx.execute(
            "UPDATE prompts
             SET status = ?2, dispatch_session_id = ?3, error = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id.as_str(),
                prompt.status.as_str(),
                prompt.dispatch_session_id.as_ref().map(|id| id.as_str()),
                prompt.error,
                prompt.updated_at_unix_ms as i64,
            ],
        )
        .context("failed to update prompt")?;
        tx.commit().context("failed to commit prompt update")?;
        Ok(prompt)
    }

    fn delete_prompt(&mut self, id: &PromptId) -> anyhow::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM prompts WHERE id = ?1", params![id.as_str()])
            .context("failed to delete prompt")?;
        Ok(removed > 0)
    }

    fn recover_interrupted(&mut self) -> anyhow::Result<usize> {
        let recovered = self
            .conn
            .execute(
                "UPDATE prompts SET status = ?1, updated_at = ?2 WHERE status IN (?3, ?4)",
                params![
                    PromptStatus::Pending.as_str(),
                    now_unix_millis() as i64,
                    PromptStatus::Dispatching.as_str(),
                    PromptStatus::Dispatched.as_str(),
                ],
            )
            .context("failed to recover interrupted prompts")?;
        Ok(recovered)
    }

    fn get_session_mapping(
        &mut self,
        qraft_ai_session_id: &QraftAiSessionId,
    ) -> anyhow::Result<Option<ExternalSessionId>> {
        let raw = self
            .conn
            .query_row(
                "SELECT external_session_id FROM session_mappings WHERE qraft_ai_session_id = ?1",
                params![qraft_ai_session_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("failed to load session mapping")?;
        match raw {
            None => Ok(None),
            Some(raw) => ExternalSessionId::parse(&raw)
                .map(Some)
                .ok_or_else(|| anyhow!("invalid external session id in mapping: {raw}")),
        }
    }

    fn set_session_mapping(
        &mut self,
        qraft_ai_session_id: &QraftAiSessionId,
        external_session_id: &ExternalSessionId,
    ) -> anyhow::Result<()> {
        self.conn
            .execute(
                "INSERT INTO session_mappings (qraft_ai_session_id, external_session_id, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(qraft_ai_session_id) DO UPDATE SET
                   external_session_id = excluded.external_session_id,
                   updated_at = excluded.updated_at",
                params![
                    qraft_ai_session_id.as_str(),
                    external_session_id.as_str(),
                    now_unix_millis() as i64,
                ],
            )
            .context("failed to save session mapping")?;
        Ok(())
    }
}

struct PromptRow {
    id: String,
    prompt_text: String,
    description: String,
    context_json: String,
    project_path: String,
    status: String,
    dispatch_session_id: Option<String>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn prompt_row(row: &Row<'_>) -> rusqlite::Result<PromptRow> {
    Ok(PromptRow {
        id: row.get(0)?,
        prompt_text: row.get(1)?,
        description: row.get(2)?,
        context_json: row.get(3)?,
        project_path: row.get(4)?,
        status: row.get(5)?,
        dispatch_session_id: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn decode_prompt(row: PromptRow) -> anyhow::Result<LocalPrompt> {
    let status = PromptStatus::parse(&row.status)
        .ok_or_else(|| anyhow!("invalid prompt status: {}", row.status))?;
    let context = serde_json::from_str(&row.context_json)
        .with_context(|| format!("invalid context for prompt {}", row.id))?;
    Ok(LocalPrompt {
        id: PromptId::from_string(row.id),
        prompt_text: row.prompt_text,
        description: row.description,
        context,
        project_path: PathBuf::from(row.project_path),
        status,
        dispatch_session_id: row.dispatch_session_id.map(QraftAiSessionId::from_string),
        created_at_unix_ms: row.created_at.max(0) as u64,
        updated_at_unix_ms: row.updated_at.max(0) as u64,
        error: row.error,
    })
}

fn load_prompt(conn: &Connection, id: &PromptId) -> anyhow::Result<Option<LocalPrompt>> {
    let row = conn
        .query_row(
            &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
            params![id.as_str()],
            prompt_row,
        )
        .optional()
        .context("failed to load prompt")?;
    row.map(decode_prompt).transpose()
}

fn configure_connection(conn: &mut Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )
    .context("failed to apply sqlite PRAGMAs")?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    let current: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .context("failed to read user_version")? as u32;

    if current > LATEST_SCHEMA_VERSION {
        return Err(anyhow!(
            "sqlite schema version is newer than this build: db={}, app={}",
            current,
            LATEST_SCHEMA_VERSION
        ));
    }

    if current == LATEST_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch("BEGIN IMMEDIATE;")
        .context("failed to begin migration transaction")?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration v{version:04}"))?;
        conn.pragma_update(None, "user_version", *version as i64)
            .context("failed to update user_version")?;
    }

    conn.execute_batch("COMMIT;")
        .context("failed to commit migration transaction")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qraft_domain::PromptTransitionError;
    use serde_json::json;

    fn temp_db_path(test_name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push("qraft-tests");
        let _ = std::fs::create_dir_all(&dir);
        dir.push(format!(
            "{test_name}-{}-{}.db",
            std::process::id(),
            now_unix_millis()
        ));
        dir
    }

    fn open_store(test_name: &str) -> SqliteStore {
        SqliteStore::new(temp_db_path(test_name)).unwrap()
    }

    fn set_status(store: &SqliteStore, id: &PromptId, status: PromptStatus) -> LocalPrompt {
        store.update(id, PromptUpdate::status(status)).unwrap()
    }

    #[test]
    fn migrations_create_schema() {
        let path = temp_db_path("migrations_create_schema");
        let db = SqliteDatabase::open(&path).unwrap();

        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('prompts','session_mappings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn migrations_reopen_does_not_fail() {
        let path = temp_db_path("migrations_reopen_does_not_fail");
        {
            let _db = SqliteDatabase::open(&path).unwrap();
        }

        let db = SqliteDatabase::open(&path).unwrap();
        let version: i64 = db
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as u32, LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let path = temp_db_path("newer_schema_is_rejected");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99i64).unwrap();
        }
        let err = match SqliteDatabase::open(&path) {
            Ok(_) => panic!("newer schema should not open"),
            Err(err) => err,
        };
        assert!(format!("{err:#}").contains("newer than this build"));
    }

    #[test]
    fn create_get_list_delete_roundtrip() {
        let store = open_store("create_get_list_delete_roundtrip");
        let mut first = NewPrompt::new("fix the bug", "/repo/a");
        first.description = "first".to_owned();
        first.context = json!({"files": ["src/lib.rs"]});
        let first = store.create(first).unwrap();
        let second = store.create(NewPrompt::new("add tests", "/repo/b")).unwrap();

        assert_eq!(first.status, PromptStatus::Pending);
        assert_eq!(store.get(&first.id).unwrap(), Some(first.clone()));

        let listed = store.list().unwrap();
        assert_eq!(
            listed.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
            vec![first.id.clone(), second.id.clone()]
        );
        assert_eq!(listed[0].context, json!({"files": ["src/lib.rs"]}));

        assert!(store.delete(&first.id).unwrap());
        assert!(!store.delete(&first.id).unwrap());
        assert_eq!(store.get(&first.id).unwrap(), None);
    }

    #[test]
    fn update_persists_status_error_and_session() {
        let store = open_store("update_persists_status_error_and_session");
        let prompt = store.create(NewPrompt::new("p", "/repo")).unwrap();
        let session = QraftAiSessionId::derive_from_seed("group");

        set_status(&store, &prompt.id, PromptStatus::Dispatching);
        let updated = store
            .update(
                &prompt.id,
                PromptUpdate::status(PromptStatus::Failed)
                    .with_error(Some("boom".to_owned()))
                    .with_dispatch_session_id(session.clone()),
            )
            .unwrap();
        assert_eq!(updated.status, PromptStatus::Failed);

        let loaded = store.get(&prompt.id).unwrap().unwrap();
        assert_eq!(loaded.status, PromptStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("boom"));
        assert_eq!(loaded.dispatch_session_id, Some(session));
    }

    #[test]
    fn update_rejects_backward_transition() {
        let store = open_store("update_rejects_backward_transition");
        let prompt = store.create(NewPrompt::new("p", "/repo")).unwrap();
        set_status(&store, &prompt.id, PromptStatus::Completed);

        let err = store
            .update(&prompt.id, PromptUpdate::status(PromptStatus::Dispatching))
            .unwrap_err();
        assert!(err.downcast_ref::<PromptTransitionError>().is_some());
        assert_eq!(
            store.get(&prompt.id).unwrap().unwrap().status,
            PromptStatus::Completed
        );
    }

    #[test]
    fn update_unknown_prompt_is_not_found() {
        let store = open_store("update_unknown_prompt_is_not_found");
        let err = store
            .update(
                &PromptId::generate(),
                PromptUpdate::status(PromptStatus::Dispatching),
            )
            .unwrap_err();
        assert!(
            err.downcast_ref::<SqliteStoreError>() == Some(&SqliteStoreError::PromptNotFound),
            "expected missing prompt to return PromptNotFound"
        );
    }

    #[test]
    fn recover_interrupted_resets_in_flight_prompts_once() {
        let path = temp_db_path("recover_interrupted_resets_in_flight_prompts_once");
        let store = SqliteStore::new(path.clone()).unwrap();
        let pending = store.create(NewPrompt::new("a", "/repo")).unwrap();
        let dispatching = store.create(NewPrompt::new("b", "/repo")).unwrap();
        let dispatched = store.create(NewPrompt::new("c", "/repo")).unwrap();
        let completed = store.create(NewPrompt::new("d", "/repo")).unwrap();
        set_status(&store, &dispatching.id, PromptStatus::Dispatching);
        set_status(&store, &dispatched.id, PromptStatus::Dispatched);
        set_status(&store, &completed.id, PromptStatus::Completed);
        drop(store);

        let store = SqliteStore::new(path).unwrap();
        assert_eq!(store.recover_interrupted().unwrap(), 2);
        assert_eq!(store.recover_interrupted().unwrap(), 0);

        for prompt in store.list().unwrap() {
            assert!(!prompt.status.is_in_flight(), "{:?}", prompt.status);
        }
        assert_eq!(
            store.get(&dispatched.id).unwrap().unwrap().status,
            PromptStatus::Pending
        );
        assert_eq!(
            store.get(&completed.id).unwrap().unwrap().status,
            PromptStatus::Completed
        );
        assert_eq!(
            store.get(&pending.id).unwrap().unwrap().status,
            PromptStatus::Pending
        );
    }

    #[test]
    fn recovered_prompts_can_be_dispatched_again() {
        let store = open_store("recovered_prompts_can_be_dispatched_again");
        let prompt = store.create(NewPrompt::new("a", "/repo")).unwrap();
        set_status(&store, &prompt.id, PromptStatus::Dispatched);
        assert_eq!(store.recover_interrupted().unwrap(), 1);
        let again = set_status(&store, &prompt.id, PromptStatus::Dispatching);
        assert_eq!(again.status, PromptStatus::Dispatching);
    }

    #[test]
    fn session_mapping_upserts_latest_external_id() {
        let store = open_store("session_mapping_upserts_latest_external_id");
        let group = QraftAiSessionId::derive_from_seed("group");
        let first = ExternalSessionId::parse("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let second = ExternalSessionId::parse("00000000-0000-4000-8000-000000000000").unwrap();

        assert_eq!(store.get_session_mapping(&group).unwrap(), None);
        store.set_session_mapping(&group, &first).unwrap();
        assert_eq!(store.get_session_mapping(&group).unwrap(), Some(first));
        store.set_session_mapping(&group, &second).unwrap();
        assert_eq!(store.get_session_mapping(&group).unwrap(), Some(second));
    }

    #[test]
    fn open_failure_is_reported_per_call() {
        let mut path = temp_db_path("open_failure_is_reported_per_call");
        std::fs::write(&path, b"not a directory").unwrap();
        path.push("qraft.db");

        let store = SqliteStore::new(path).unwrap();
        assert!(store.list().is_err());
        assert!(store.recover_interrupted().is_err());
        assert!(store.create(NewPrompt::new("p", "/repo")).is_err());
    }
}
