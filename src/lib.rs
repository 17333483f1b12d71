// sqlgate - safety-gated SQL execution
// Core library

pub mod config;
pub mod executor;
pub mod loader;
pub mod metrics;
pub mod observability;

pub use config::{GateConfig, LoggingConfig};
pub use executor::{ExecuteOptions, ExecutionReport, GateDecision, GatedExecutor, SafetyBypass};
pub use loader::{CsvTable, LoadReport, TableLoader};
pub use sqlgate_core::{GateError, GateResult, SqlConnection};
pub use sqlgate_drivers::DuckDbConnection;
pub use sqlgate_sql::{SqlClassifier, SqlDialect, SqlTemplate, Verdict};

/// Opens the configured DuckDB database
pub fn open_database(config: &GateConfig) -> GateResult<DuckDbConnection> {
    Ok(DuckDbConnection::open(&config.database)?)
}

/// Executor using the configured dialect and the built-in rules
pub fn executor_for(config: &GateConfig) -> GatedExecutor {
    GatedExecutor::new(SqlClassifier::new(config.dialect))
}
