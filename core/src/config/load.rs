use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;
use crate::executor::STATS_ENV_VAR;

/// Points at a config file to use instead of `./dagrun.toml`.
pub const CONFIG_ENV_VAR: &str = "DAGRUN_CONFIG";
pub const MAX_WORKERS_ENV_VAR: &str = "DAGRUN_MAX_WORKERS";

const LOCAL_CONFIG: &str = "dagrun.toml";

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: $DAGRUN_CONFIG
    let explicit = std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty());

    // Priority 2: ./dagrun.toml (current directory)
    let local_config = Path::new(LOCAL_CONFIG);

    let mut cfg = match explicit {
        Some(path) => read_config(&path)?,
        None if local_config.exists() => read_config(local_config)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Load `path` and apply environment overrides.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let mut cfg = read_config(path)?;
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Ok(v) = std::env::var(MAX_WORKERS_ENV_VAR) {
        if !v.trim().is_empty() {
            cfg.executor.max_workers = v
                .trim()
                .parse()
                .with_context(|| format!("{MAX_WORKERS_ENV_VAR} must be a number, got '{v}'"))?;
        }
    }
    if std::env::var_os(STATS_ENV_VAR).is_some() {
        cfg.executor.collect_stats = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[executor]\nmax_workers = 3\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg.executor.max_workers, 3);
        assert!(cfg.executor.continue_on_failure);
        assert_eq!(cfg.executor.thread_name_prefix, "Execution worker");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.console);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor\nmax_workers = ").unwrap();

        let err = read_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(&dir.path().join("absent.toml")).is_err());
    }
}
