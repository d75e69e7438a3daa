use anyhow::{Context, Result};
use std::path::PathBuf;

const DB_FILE: &str = "polimit.db";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
    /// Acting user when `--as` is not given.
    pub(crate) user: Option<String>,
    pub(crate) log_filter: String,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok(), default_db_path)
    }

    /// Resolve settings from `lookup` (an environment-like source), falling
    /// back to `default_db` only when no explicit database path is set.
    pub(crate) fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        default_db: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = match non_empty("POLIMIT_DB") {
            Some(p) => PathBuf::from(crate::run::expand_home(&p)),
            None => default_db()?,
        };
        let user = non_empty("POLIMIT_USER")
            .or_else(|| non_empty("USER"))
            .or_else(|| non_empty("USERNAME"));
        let log_filter = non_empty("POLIMIT_LOG")
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            db_path,
            user,
            log_filter,
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "polimit", "POLimit")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join(DB_FILE))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    fn resolve_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::resolve(
            |key| map.get(key).cloned(),
            || Ok(PathBuf::from("/data/polimit.db")),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = resolve_with(&[]);
        assert_eq!(cfg.db_path, PathBuf::from("/data/polimit.db"));
        assert_eq!(cfg.user, None);
        assert_eq!(cfg.log_filter, "warn");
    }

    #[test]
    fn test_explicit_db_skips_default() {
        let cfg = Config::resolve(
            |key| (key == "POLIMIT_DB").then(|| "/tmp/limits.db".to_string()),
            || anyhow::bail!("default path must not be consulted"),
        )
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/limits.db"));
    }

    #[test]
    fn test_user_precedence() {
        let cfg = resolve_with(&[("USER", "shell"), ("POLIMIT_USER", "md")]);
        assert_eq!(cfg.user.as_deref(), Some("md"));

        let cfg = resolve_with(&[("USER", "shell")]);
        assert_eq!(cfg.user.as_deref(), Some("shell"));

        let cfg = resolve_with(&[("USERNAME", "win"), ("POLIMIT_USER", "  ")]);
        assert_eq!(cfg.user.as_deref(), Some("win"));
    }

    #[test]
    fn test_log_filter_precedence() {
        let cfg = resolve_with(&[("RUST_LOG", "debug")]);
        assert_eq!(cfg.log_filter, "debug");

        let cfg = resolve_with(&[("RUST_LOG", "debug"), ("POLIMIT_LOG", "polimit=info")]);
        assert_eq!(cfg.log_filter, "polimit=info");
    }
}
