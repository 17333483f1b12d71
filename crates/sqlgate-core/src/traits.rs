//! SqlConnection trait definition
//!
//! The gate never owns a database. Callers hand it something implementing
//! this trait and keep ownership of the underlying connection and catalog.

use crate::error::EngineResult;
use crate::types::QueryResult;

/// A live, caller-owned database connection
///
/// Calls are blocking and sequential. Implementations are not expected to
/// support concurrent statements on the same connection.
pub trait SqlConnection {
    /// Returns the identifier of the engine behind this connection (e.g., "duckdb")
    fn engine_id(&self) -> &'static str;

    /// Executes every statement in `sql`, failing on the first error
    fn execute_batch(&self, sql: &str) -> EngineResult<()>;

    /// Runs a read-only query and returns its rows
    fn query(&self, sql: &str) -> EngineResult<QueryResult>;
}

impl<C: SqlConnection + ?Sized> SqlConnection for &C {
    fn engine_id(&self) -> &'static str {
        (**self).engine_id()
    }

    fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        (**self).execute_batch(sql)
    }

    fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        (**self).query(sql)
    }
}
