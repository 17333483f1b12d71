// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Precedence, lowest first: defaults, JSON config file, `SQLGATE_*`
//! environment variables, command-line flags (applied by the binary).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlgate_core::{GateError, GateResult};
use sqlgate_sql::SqlDialect;
use tracing::debug;

pub const ENV_DATABASE: &str = "SQLGATE_DATABASE";
pub const ENV_DIALECT: &str = "SQLGATE_DIALECT";
pub const ENV_CHECK_SAFETY: &str = "SQLGATE_CHECK_SAFETY";
pub const ENV_LOG_DIR: &str = "SQLGATE_LOG_DIR";

const DEFAULT_DATABASE: &str = ":memory:";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily JSON log files; stderr when unset
    pub directory: Option<PathBuf>,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: Option<String>,
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: None,
            retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// DuckDB file path, or `:memory:`
    pub database: String,
    pub dialect: SqlDialect,
    /// Classify SQL before running it
    pub check_safety: bool,
    /// Base directory for relative SQL file paths
    pub sql_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            dialect: SqlDialect::default(),
            check_safety: true,
            sql_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl GateConfig {
    /// Defaults, then the optional file, then the process environment
    pub fn load(path: Option<&Path>) -> GateResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> GateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            GateError::config(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Applies `SQLGATE_*` overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> GateResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = database;
        }
        if let Some(dialect) = lookup(ENV_DIALECT) {
            self.dialect = dialect.parse()?;
        }
        if let Some(flag) = lookup(ENV_CHECK_SAFETY) {
            self.check_safety = parse_bool(&flag).ok_or_else(|| {
                GateError::config(format!("{ENV_CHECK_SAFETY} must be true or false, got '{flag}'"))
            })?;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.logging.directory = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Resolves a SQL file path against `sql_dir`
    pub fn resolve_sql_path(&self, path: &Path) -> PathBuf {
        match &self.sql_dir {
            Some(dir) if path.is_relative() && !path.exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_check_safety() {
        let config = GateConfig::default();
        assert!(config.check_safety);
        assert_eq!(config.database, ":memory:");
        assert_eq!(config.dialect, SqlDialect::DuckDb);
        assert_eq!(config.logging.retention_days, 14);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlgate.json");
        std::fs::write(&path, r#"{ "database": "papal.duckdb", "dialect": "postgres" }"#).unwrap();

        let config = GateConfig::from_file(&path).unwrap();
        assert_eq!(config.database, "papal.duckdb");
        assert_eq!(config.dialect, SqlDialect::Postgres);
        assert!(config.check_safety);
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlgate.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(GateConfig::from_file(&path).unwrap_err().kind(), "config");
        assert_eq!(
            GateConfig::from_file(&dir.path().join("missing.json"))
                .unwrap_err()
                .kind(),
            "config"
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = GateConfig::default();
        config
            .apply_env(env(&[
                (ENV_DATABASE, "env.duckdb"),
                (ENV_DIALECT, "SQLite"),
                (ENV_CHECK_SAFETY, "off"),
                (ENV_LOG_DIR, "/tmp/sqlgate-logs"),
            ]))
            .unwrap();
        assert_eq!(config.database, "env.duckdb");
        assert_eq!(config.dialect, SqlDialect::Sqlite);
        assert!(!config.check_safety);
        assert_eq!(
            config.logging.directory.as_deref(),
            Some(Path::new("/tmp/sqlgate-logs"))
        );
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let mut config = GateConfig::default();
        assert!(config.apply_env(env(&[(ENV_CHECK_SAFETY, "maybe")])).is_err());
        assert!(config.apply_env(env(&[(ENV_DIALECT, "oracle")])).is_err());
    }

    #[test]
    fn sql_dir_resolves_relative_paths() {
        let config = GateConfig {
            sql_dir: Some(PathBuf::from("/opt/sqlgate/sql")),
            ..GateConfig::default()
        };
        assert_eq!(
            config.resolve_sql_path(Path::new("does_not_exist_here.sql")),
            PathBuf::from("/opt/sqlgate/sql/does_not_exist_here.sql")
        );
        assert_eq!(
            config.resolve_sql_path(Path::new("/abs/file.sql")),
            PathBuf::from("/abs/file.sql")
        );
    }
}
