// SPDX-License-Identifier: Apache-2.0

//! CSV table loader.
//!
//! Recreates a table from a CSV source in one transaction, then counts the
//! loaded rows. The recreation script drops its target, so it runs through the
//! gated executor under the loader's own named bypass. A caller-supplied
//! script is classified first; the only rule hit it may carry is the DROP
//! TABLE of the table being loaded.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlgate_core::{GateError, GateResult, SqlConnection, Value};
use sqlgate_sql::rules::DROP_TABLE_OR_DATABASE;
use sqlgate_sql::{Params, ParsedStatement, SqlTemplate, StatementKind};
use tracing::{debug, info, warn};

use crate::executor::{ExecuteOptions, ExecutionReport, GatedExecutor, SafetyBypass};

/// Bypass used for recreation scripts
pub const LOADER_BYPASS: SafetyBypass = SafetyBypass::trusted("table-loader");

const DEFAULT_NULL_STRING: &str = "NA";

const RECREATE_SCRIPT: &str = "\
BEGIN TRANSACTION;
DROP TABLE IF EXISTS {table};
CREATE TABLE {table} AS SELECT * FROM read_csv({csv_source}, nullstr = [{null_string}]);
COMMIT;
";

/// A table to (re)build from a CSV file or URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub table: String,
    /// Path or URL understood by DuckDB's `read_csv`
    pub csv_source: String,
    /// Cell text read as NULL
    pub null_string: String,
    /// Recreation script with `{table}`, `{csv_source}` and `{null_string}`
    pub template: Option<PathBuf>,
}

impl CsvTable {
    pub fn new(table: impl Into<String>, csv_source: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            csv_source: csv_source.into(),
            null_string: DEFAULT_NULL_STRING.to_string(),
            template: None,
        }
    }

    pub fn with_null_string(mut self, null_string: impl Into<String>) -> Self {
        self.null_string = null_string.into();
        self
    }

    pub fn with_template(mut self, path: impl AsRef<Path>) -> Self {
        self.template = Some(path.as_ref().to_path_buf());
        self
    }

    /// Placeholder values, escaped for direct insertion into SQL
    pub fn params(&self) -> Params {
        Params::from([
            ("table".to_string(), quote_ident(&self.table)),
            ("csv_source".to_string(), quote_literal(&self.csv_source)),
            ("null_string".to_string(), quote_literal(&self.null_string)),
        ])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub row_count: i64,
    pub execution: ExecutionReport,
}

/// Rebuilds tables through a [`GatedExecutor`]
#[derive(Debug, Clone, Default)]
pub struct TableLoader {
    executor: GatedExecutor,
}

impl TableLoader {
    pub fn new(executor: GatedExecutor) -> Self {
        Self { executor }
    }

    pub fn recreate(&self, conn: &dyn SqlConnection, source: &CsvTable) -> GateResult<LoadReport> {
        if source.table.trim().is_empty() {
            return Err(GateError::config("Table name cannot be empty"));
        }

        let template = match &source.template {
            Some(path) => SqlTemplate::load(path)?,
            None => SqlTemplate::new(format!("<recreate {}>", source.table), RECREATE_SCRIPT),
        };
        debug!(
            table = %source.table,
            source = template.source_id(),
            csv = %source.csv_source,
            "Recreating table from CSV"
        );

        let sql = self
            .executor
            .render(&template, &ExecuteOptions::checked().with_params(source.params()))?;
        if source.template.is_some() {
            self.vet_template(template.source_id(), &sql, &source.table)?;
        }

        let options = ExecuteOptions::checked().with_bypass(LOADER_BYPASS);
        let execution = match self.executor.run_sql(conn, template.source_id(), &sql, &options) {
            Ok(report) => report,
            Err(e) => {
                if e.is_execution() {
                    // A failed statement leaves the script's transaction open.
                    if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                        debug!(error = %rollback, "No transaction to roll back");
                    }
                }
                warn!(table = %source.table, error = %e, "Table recreation failed");
                return Err(e);
            }
        };

        let row_count = self.count_rows(conn, &source.table)?;
        info!(table = %source.table, rows = row_count, "Table recreated");

        Ok(LoadReport {
            table: source.table.clone(),
            row_count,
            execution,
        })
    }

    /// Checks a caller-supplied recreation script. The only violation it may
    /// carry is a DROP TABLE of the managed table itself.
    fn vet_template(&self, source_id: &str, sql: &str, table: &str) -> GateResult<()> {
        let classifier = self.executor.classifier();
        let statements = classifier.parse(sql).inspect_err(|e| {
            warn!(source = source_id, error = %e, "Recreation script could not be parsed");
        })?;

        for violation in classifier.violations(&statements) {
            if violation.rule.id == DROP_TABLE_OR_DATABASE
                && drops_only_table(&violation.statement, table)
            {
                continue;
            }
            warn!(
                source = source_id,
                table,
                rule = violation.rule.id,
                position = violation.statement.position,
                "Recreation script touches more than its own table"
            );
            return Err(violation.into_error());
        }
        Ok(())
    }

    fn count_rows(&self, conn: &dyn SqlConnection, table: &str) -> GateResult<i64> {
        let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
        let result = self.executor.query(conn, "<row count>", &sql)?;
        match result.scalar() {
            Some(Value::Int(n)) => Ok(*n),
            other => Err(GateError::execution(
                "<row count>",
                format!("Unexpected row count result: {other:?}"),
            )),
        }
    }
}

/// Whether `statement` is a DROP TABLE naming `table` and nothing else
fn drops_only_table(statement: &ParsedStatement, table: &str) -> bool {
    let is_table_drop = matches!(
        &statement.kind,
        StatementKind::Drop { object } if object.eq_ignore_ascii_case("table")
    );
    is_table_drop
        && !statement.objects.is_empty()
        && statement
            .objects
            .iter()
            .all(|name| *name == quote_ident(table) || name.eq_ignore_ascii_case(table))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
