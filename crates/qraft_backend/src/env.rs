use anyhow::anyhow;
use qraft_domain::paths;
use std::path::PathBuf;

/// Trimmed value of `name`; unset and blank values both read as `None`.
pub(crate) fn optional_trimmed_path_from_env(name: &str) -> anyhow::Result<Option<PathBuf>> {
    let value = match std::env::var_os(name) {
        Some(value) => value,
        None => return Ok(None),
    };

    let value = value.to_string_lossy();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    Ok(Some(PathBuf::from(trimmed)))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("HOME is not set; set {} explicitly", paths::QRAFT_ROOT_ENV))
}

/// Data root: `QRAFT_ROOT`, else `$HOME/.qraft`. Tests get a private temp dir.
pub fn resolve_qraft_root() -> anyhow::Result<PathBuf> {
    if let Some(root) = optional_trimmed_path_from_env(paths::QRAFT_ROOT_ENV)? {
        return Ok(root);
    }

    if cfg!(test) {
        let millis = qraft_domain::time::now_unix_millis();
        let pid = std::process::id();
        return Ok(std::env::temp_dir().join(format!("qraft-test-{pid}-{millis}")));
    }

    Ok(home_dir()?.join(".qraft"))
}

pub fn resolve_sqlite_path() -> anyhow::Result<PathBuf> {
    Ok(paths::sqlite_path(&resolve_qraft_root()?))
}

pub fn resolve_claude_exec() -> anyhow::Result<PathBuf> {
    Ok(optional_trimmed_path_from_env(paths::QRAFT_CLAUDE_BIN_ENV)?
        .unwrap_or_else(|| PathBuf::from("claude")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EnvVarGuard, lock_env};

    const TEST_VAR: &str = "QRAFT_TEST_TRIMMED_PATH_ENV";

    #[test]
    fn optional_trimmed_path_from_env_returns_none_when_unset() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::remove(TEST_VAR);

        let loaded = optional_trimmed_path_from_env(TEST_VAR).expect("unset env should not error");
        assert!(loaded.is_none());
    }

    #[test]
    fn optional_trimmed_path_from_env_treats_blank_as_unset() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set(TEST_VAR, "   ");

        let loaded = optional_trimmed_path_from_env(TEST_VAR).expect("blank env should not error");
        assert!(loaded.is_none());
    }

    #[test]
    fn blank_qraft_root_falls_back_to_default() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set(paths::QRAFT_ROOT_ENV, "  ");

        let root = resolve_qraft_root().expect("blank root should not fail startup");
        assert!(root.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn optional_trimmed_path_from_env_trims_value() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set(TEST_VAR, " qraft-test ");

        let loaded = optional_trimmed_path_from_env(TEST_VAR).expect("non-empty env should succeed");
        assert_eq!(loaded, Some(PathBuf::from("qraft-test")));
    }

    #[test]
    fn qraft_root_prefers_env() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set(paths::QRAFT_ROOT_ENV, "/tmp/qraft-root");

        assert_eq!(resolve_qraft_root().unwrap(), PathBuf::from("/tmp/qraft-root"));
        assert_eq!(
            resolve_sqlite_path().unwrap(),
            PathBuf::from("/tmp/qraft-root/qraft.db")
        );
    }

    #[test]
    fn qraft_root_defaults_to_temp_dir_under_test() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::remove(paths::QRAFT_ROOT_ENV);

        let root = resolve_qraft_root().unwrap();
        assert!(root.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn claude_exec_defaults_to_path_lookup() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::remove(paths::QRAFT_CLAUDE_BIN_ENV);
        assert_eq!(resolve_claude_exec().unwrap(), PathBuf::from("claude"));

        let _override = EnvVarGuard::set(paths::QRAFT_CLAUDE_BIN_ENV, "/opt/bin/claude");
        assert_eq!(resolve_claude_exec().unwrap(), PathBuf::from("/opt/bin/claude"));
    }
}
