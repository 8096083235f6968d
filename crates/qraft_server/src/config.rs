use anyhow::{Context as _, anyhow};
use qraft_domain::{QueueConfig, paths};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:7155";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AgentBackendKind {
    /// Spawns the `claude` CLI per prompt.
    Claude,
    /// Echoes prompts back without contacting an agent.
    Offline,
}

impl AgentBackendKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "claude" => Some(Self::Claude),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Offline => "offline",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub queue: QueueConfig,
    pub agent_backend: AgentBackendKind,
    pub claude_exec: PathBuf,
}

impl RuntimeConfig {
    /// Reads every `QRAFT_*` variable. Malformed values fail startup instead of
    /// silently falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_addr = env_value(paths::QRAFT_SERVER_ADDR_ENV)
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_owned());
        let addr: SocketAddr = raw_addr
            .parse()
            .with_context(|| format!("invalid {}: {raw_addr}", paths::QRAFT_SERVER_ADDR_ENV))?;

        let agent_backend = match env_value(paths::QRAFT_AGENT_BACKEND_ENV) {
            Some(raw) => AgentBackendKind::parse(&raw).ok_or_else(|| {
                anyhow!(
                    "invalid {}: {raw} (expected claude or offline)",
                    paths::QRAFT_AGENT_BACKEND_ENV
                )
            })?,
            None => AgentBackendKind::Claude,
        };

        let defaults = QueueConfig::default();
        let max_concurrent =
            env_usize(paths::QRAFT_MAX_CONCURRENT_ENV)?.unwrap_or(defaults.max_concurrent);
        let max_queue_size =
            env_usize(paths::QRAFT_MAX_QUEUE_SIZE_ENV)?.unwrap_or(defaults.max_queue_size);
        let session_timeout = match env_u64(paths::QRAFT_SESSION_TIMEOUT_MS_ENV)? {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.session_timeout,
        };

        Ok(Self {
            addr,
            db_path: qraft_backend::resolve_sqlite_path()?,
            queue: QueueConfig {
                max_concurrent,
                max_queue_size,
                session_timeout,
            }
            .normalized(),
            agent_backend,
            claude_exec: qraft_backend::resolve_claude_exec()?,
        })
    }
}

fn env_value(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

fn env_usize(name: &str) -> anyhow::Result<Option<usize>> {
    env_value(name)
        .map(|raw| {
            raw.parse::<usize>()
                .with_context(|| format!("invalid {name}: {raw}"))
        })
        .transpose()
}

fn env_u64(name: &str) -> anyhow::Result<Option<u64>> {
    env_value(name)
        .map(|raw| {
            raw.parse::<u64>()
                .with_context(|| format!("invalid {name}: {raw}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    fn lock_env() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    struct EnvGuard {
        saved: Vec<(&'static str, Option<OsString>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&'static str]) -> Self {
            let saved = keys
                .iter()
                .map(|key| (*key, std::env::var_os(key)))
                .collect();
            Self { saved }
        }

        fn set(&self, key: &str, value: &str) {
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&self, key: &str) {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                unsafe {
                    match value {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    const KEYS: [&str; 7] = [
        paths::QRAFT_ROOT_ENV,
        paths::QRAFT_SERVER_ADDR_ENV,
        paths::QRAFT_AGENT_BACKEND_ENV,
        paths::QRAFT_MAX_CONCURRENT_ENV,
        paths::QRAFT_MAX_QUEUE_SIZE_ENV,
        paths::QRAFT_SESSION_TIMEOUT_MS_ENV,
        paths::QRAFT_CLAUDE_BIN_ENV,
    ];

    fn clean_env() -> EnvGuard {
        let guard = EnvGuard::new(&KEYS);
        for key in KEYS {
            guard.remove(key);
        }
        guard.set(paths::QRAFT_ROOT_ENV, "/tmp/qraft-config-test");
        guard
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _lock = lock_env();
        let _env = clean_env();

        let config = RuntimeConfig::from_env().expect("config");
        assert_eq!(config.addr.to_string(), DEFAULT_SERVER_ADDR);
        assert_eq!(config.queue, QueueConfig::default());
        assert_eq!(config.agent_backend, AgentBackendKind::Claude);
        assert_eq!(config.claude_exec, PathBuf::from("claude"));
        assert_eq!(
            config.db_path,
            PathBuf::from("/tmp/qraft-config-test").join("qraft.db")
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let _lock = lock_env();
        let env = clean_env();
        env.set(paths::QRAFT_SERVER_ADDR_ENV, "127.0.0.1:9000");
        env.set(paths::QRAFT_AGENT_BACKEND_ENV, " Offline ");
        env.set(paths::QRAFT_MAX_CONCURRENT_ENV, "3");
        env.set(paths::QRAFT_MAX_QUEUE_SIZE_ENV, "0");
        env.set(paths::QRAFT_SESSION_TIMEOUT_MS_ENV, "2500");

        let config = RuntimeConfig::from_env().expect("config");
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.agent_backend, AgentBackendKind::Offline);
        assert_eq!(config.queue.max_concurrent, 3);
        assert_eq!(config.queue.max_queue_size, 0);
        assert_eq!(
            config.queue.session_timeout,
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn zero_timeout_disables_the_deadline() {
        let _lock = lock_env();
        let env = clean_env();
        env.set(paths::QRAFT_SESSION_TIMEOUT_MS_ENV, "0");

        let config = RuntimeConfig::from_env().expect("config");
        assert_eq!(config.queue.session_timeout, None);
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        let _lock = lock_env();
        let env = clean_env();
        env.set(paths::QRAFT_MAX_CONCURRENT_ENV, "0");

        let config = RuntimeConfig::from_env().expect("config");
        assert_eq!(config.queue.max_concurrent, 1);
    }

    #[test]
    fn malformed_values_fail_startup() {
        let _lock = lock_env();
        let env = clean_env();
        env.set(paths::QRAFT_MAX_QUEUE_SIZE_ENV, "ten");
        let err = RuntimeConfig::from_env().expect_err("bad number");
        assert!(err.to_string().contains("QRAFT_MAX_QUEUE_SIZE"), "{err}");

        env.remove(paths::QRAFT_MAX_QUEUE_SIZE_ENV);
        env.set(paths::QRAFT_AGENT_BACKEND_ENV, "codex");
        let err = RuntimeConfig::from_env().expect_err("bad backend");
        assert!(err.to_string().contains("QRAFT_AGENT_BACKEND"), "{err}");

        env.remove(paths::QRAFT_AGENT_BACKEND_ENV);
        env.set(paths::QRAFT_SERVER_ADDR_ENV, "not-an-addr");
        let err = RuntimeConfig::from_env().expect_err("bad addr");
        assert!(err.to_string().contains("QRAFT_SERVER_ADDR"), "{err}");
    }
}
