// SPDX-License-Identifier: Apache-2.0

//! DuckDB Connection
//!
//! Implements [`SqlConnection`] for DuckDB using the native `duckdb` crate.
//!
//! ## DuckDB Specifics
//!
//! - DuckDB is a file-based embedded OLAP database
//! - Supports `:memory:` for in-memory databases
//! - `execute_batch` runs multi-statement scripts, including explicit
//!   `BEGIN TRANSACTION; ... COMMIT;` blocks
//!
//! ## Concurrency Model
//!
//! The `duckdb` crate provides a synchronous API and its `Connection` is
//! `!Sync`. The gate runs one submission at a time on the caller's thread,
//! so the connection is used directly without locking.

use std::path::Path;
use std::time::Instant;

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::Connection;
use chrono::{DateTime, NaiveDate, NaiveTime};
use sqlgate_core::{ColumnInfo, EngineError, EngineResult, QueryResult, Row, SqlConnection, Value};
use tracing::{debug, info};

const MEMORY_PATH: &str = ":memory:";

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// An open DuckDB database
pub struct DuckDbConnection {
    conn: Connection,
    /// The file path to the database (or ":memory:").
    pub db_path: String,
}

impl DuckDbConnection {
    /// Opens (or creates) a database file; `:memory:` opens an in-memory database
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let db_path = path.as_ref().display().to_string();
        Self::validate_path(&db_path)?;

        let trimmed = db_path.trim();
        if trimmed == MEMORY_PATH {
            return Self::open_in_memory();
        }

        let conn = Connection::open(trimmed).map_err(|e| {
            EngineError::connection_failed(format!("Failed to open DuckDB file '{trimmed}': {e}"))
        })?;
        info!(path = trimmed, "Opened DuckDB database");
        Ok(Self {
            conn,
            db_path: trimmed.to_string(),
        })
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            EngineError::connection_failed(format!("Failed to open DuckDB in-memory: {e}"))
        })?;
        debug!("Opened in-memory DuckDB database");
        Ok(Self {
            conn,
            db_path: MEMORY_PATH.to_string(),
        })
    }

    /// Validates the DuckDB file path.
    pub fn validate_path(path: &str) -> EngineResult<()> {
        let path = path.trim();

        if path == MEMORY_PATH {
            return Ok(());
        }

        if path.is_empty() {
            return Err(EngineError::connection_failed("DuckDB path cannot be empty."));
        }

        if path.contains("://") {
            return Err(EngineError::connection_failed(format!(
                "Invalid DuckDB path format: {path}"
            )));
        }

        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == MEMORY_PATH
    }
}

impl SqlConnection for DuckDbConnection {
    fn engine_id(&self) -> &'static str {
        "duckdb"
    }

    fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| classify_error(e.to_string()))
    }

    fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        execute_select(&self.conn, sql, Instant::now())
    }
}

// ==================== Type Conversion ====================

/// Converts a DuckDB value into a sqlgate [`Value`].
///
/// Temporal types are rendered as ISO-8601 text; wide and exotic numeric
/// types fall back to their textual form.
fn duckdb_value_to_sqlgate(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i64::from(i)),
        DuckValue::SmallInt(i) => Value::Int(i64::from(i)),
        DuckValue::Int(i) => Value::Int(i64::from(i)),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::UTinyInt(i) => Value::Int(i64::from(i)),
        DuckValue::USmallInt(i) => Value::Int(i64::from(i)),
        DuckValue::UInt(i) => Value::Int(i64::from(i)),
        DuckValue::UBigInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(i.to_string()),
        },
        DuckValue::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(i.to_string()),
        },
        DuckValue::Float(f) => Value::Float(f64::from(f)),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Text(d.to_string()),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Bytes(b),
        DuckValue::Date32(days) => date_from_epoch_days(days)
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Int(i64::from(days))),
        DuckValue::Timestamp(unit, raw) => DateTime::from_timestamp_micros(to_micros(unit, raw))
            .map(|ts| Value::Text(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Int(raw)),
        DuckValue::Time64(unit, raw) => time_from_micros(to_micros(unit, raw))
            .map(|t| Value::Text(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Int(raw)),
        other => Value::Text(format!("{other:?}")),
    }
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn time_from_micros(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// Executes a SELECT-style query and returns a QueryResult.
///
/// NOTE: DuckDB crate requires that `column_name()` is called AFTER the statement
/// has been executed (i.e., after iterating rows). We collect rows first, then
/// extract column names.
fn execute_select(conn: &Connection, sql: &str, start: Instant) -> EngineResult<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| classify_error(e.to_string()))?;

    let rows_iter = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            let mut values = Vec::with_capacity(col_count);
            for i in 0..col_count {
                values.push(duckdb_value_to_sqlgate(row.get::<_, DuckValue>(i)?));
            }
            Ok(Row { values })
        })
        .map_err(|e| classify_error(e.to_string()))?;

    let mut rows = Vec::new();
    for row_result in rows_iter {
        let row = row_result.map_err(|e| EngineError::execution_error(e.to_string()))?;
        rows.push(row);
    }

    let column_count = stmt.column_count();
    let columns: Vec<ColumnInfo> = (0..column_count)
        .map(|i| ColumnInfo {
            name: stmt
                .column_name(i)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| format!("col_{i}")),
            data_type: infer_type(&rows, i).to_string(),
            nullable: true,
        })
        .collect();

    let execution_time_ms = start.elapsed().as_micros() as f64 / 1000.0;

    Ok(QueryResult {
        columns,
        rows,
        execution_time_ms,
    })
}

/// Type of the first non-null value in a column
fn infer_type(rows: &[Row], idx: usize) -> &'static str {
    rows.iter()
        .filter_map(|row| row.values.get(idx))
        .find(|v| !v.is_null())
        .map(Value::type_name)
        .unwrap_or("NULL")
}

/// Classifies a DuckDB error message into syntax or execution error.
fn classify_error(msg: String) -> EngineError {
    let lower = msg.to_lowercase();
    if lower.contains("syntax") || lower.contains("parser") {
        EngineError::syntax_error(msg)
    } else {
        EngineError::execution_error(msg)
    }
}
