// SPDX-License-Identifier: Apache-2.0

//! SQL dialect selection.
//!
//! Maps an engine name to the `sqlparser` dialect used to build statement
//! nodes. DuckDB is the default because the pipeline's database is DuckDB.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlgate_core::GateError;
use sqlparser::dialect::{
    Dialect, DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
    Sqlite,
    MsSql,
    Generic,
}

impl SqlDialect {
    /// Resolves an engine or driver name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "duckdb" => Some(Self::DuckDb),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "mssql" | "sqlserver" => Some(Self::MsSql),
            "generic" | "ansi" => Some(Self::Generic),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDb => "duckdb",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
            Self::Generic => "generic",
        }
    }

    /// The `sqlparser` dialect implementing this engine's grammar
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            Self::DuckDb => Box::new(DuckDbDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::MySql => Box::new(MySqlDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
            Self::MsSql => Box::new(MsSqlDialect {}),
            Self::Generic => Box::new(GenericDialect {}),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| GateError::config(format!("Unknown SQL dialect: '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aliases_case_insensitively() {
        assert_eq!(SqlDialect::from_name("DuckDB"), Some(SqlDialect::DuckDb));
        assert_eq!(SqlDialect::from_name(" PostgreSQL "), Some(SqlDialect::Postgres));
        assert_eq!(SqlDialect::from_name("sqlserver"), Some(SqlDialect::MsSql));
        assert_eq!(SqlDialect::from_name("oracle"), None);
    }

    #[test]
    fn from_str_reports_config_error() {
        let err = "oracle".parse::<SqlDialect>().unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&SqlDialect::DuckDb).unwrap();
        assert_eq!(json, "\"duckdb\"");
        let parsed: SqlDialect = serde_json::from_str("\"mssql\"").unwrap();
        assert_eq!(parsed, SqlDialect::MsSql);
    }
}
