// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs against an in-memory DuckDB database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlgate_core::{SqlConnection, Value};
use sqlgate_lib::{CsvTable, DuckDbConnection, ExecuteOptions, GatedExecutor, TableLoader};

const POPES_CSV: &str = "\
number,name_full,name,suffix,canonization,birth,start,end,age_start,age_end,tenure
1,Saint Peter,Peter,NA,Saint,NA,NA,NA,NA,NA,34
265,Benedict XVI,Benedict,XVI,NA,1927-04-16,2005-04-19,2013-02-28,78,85,7.86
266,Francis,Francis,NA,NA,1936-12-17,2013-03-13,NA,76,NA,NA
";

fn sql_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("sql").join(name)
}

fn write_csv(dir: &Path) -> String {
    let path = dir.join("popes.csv");
    std::fs::write(&path, POPES_CSV).unwrap();
    path.display().to_string()
}

#[test]
fn loader_recreates_table_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path());
    let conn = DuckDbConnection::open_in_memory().unwrap();

    let report = TableLoader::default()
        .recreate(&conn, &CsvTable::new("popes", &csv))
        .unwrap();
    assert_eq!(report.table, "popes");
    assert_eq!(report.row_count, 3);

    // "NA" cells are NULL
    let nulls = conn
        .query("SELECT count(*) FROM popes WHERE suffix IS NULL")
        .unwrap();
    assert_eq!(nulls.scalar(), Some(&Value::Int(2)));

    // A second load replaces the table instead of appending
    let again = TableLoader::default()
        .recreate(&conn, &CsvTable::new("popes", &csv))
        .unwrap();
    assert_eq!(again.row_count, 3);
}

#[test]
fn shipped_templates_build_and_update_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path());
    let conn = DuckDbConnection::open_in_memory().unwrap();

    let spec = CsvTable::new("popes", &csv).with_template(sql_file("create_popes.sql"));
    let loaded = TableLoader::default().recreate(&conn, &spec).unwrap();
    assert_eq!(loaded.row_count, 3);

    let params: HashMap<String, String> = [
        ("name", "Francis"),
        ("reign_end", "2025-04-21"),
        ("age_end", "88"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    GatedExecutor::default()
        .run_file(
            &conn,
            sql_file("update_pope_reign_end.sql"),
            &ExecuteOptions::checked().with_params(params),
        )
        .unwrap();

    let francis = conn
        .query("SELECT reign_end, age_end FROM popes WHERE name = 'Francis'")
        .unwrap();
    assert_eq!(francis.rows.len(), 1);
    assert_eq!(francis.rows[0].values[0], Value::Text("2025-04-21".to_string()));
    assert_eq!(francis.rows[0].values[1], Value::Int(88));
}

#[test]
fn gate_protects_a_live_table() {
    let conn = DuckDbConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE accounts AS SELECT * FROM range(3) t(id);")
        .unwrap();

    let executor = GatedExecutor::default();
    for sql in ["DROP TABLE accounts;", "DELETE FROM accounts;", "TRUNCATE accounts;"] {
        assert!(executor
            .run_sql(&conn, "inline", sql, &ExecuteOptions::checked())
            .is_err());
    }

    let count = conn.query("SELECT count(*) FROM accounts").unwrap();
    assert_eq!(count.scalar(), Some(&Value::Int(3)));
}

#[test]
fn caller_template_cannot_touch_other_tables() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path());
    let template = dir.path().join("recreate.sql");
    std::fs::write(
        &template,
        "DELETE FROM keep;\n\
         UPDATE keep2 SET x = 0;\n\
         CREATE TABLE {table} AS SELECT * FROM read_csv({csv_source}, nullstr = [{null_string}]);\n",
    )
    .unwrap();

    let conn = DuckDbConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE keep AS SELECT * FROM range(5) t(x);
         CREATE TABLE keep2 AS SELECT * FROM range(2) t(x);",
    )
    .unwrap();

    let err = TableLoader::default()
        .recreate(&conn, &CsvTable::new("popes", &csv).with_template(&template))
        .unwrap_err();
    assert!(err.is_policy_rejection(), "{err:?}");

    let keep = conn.query("SELECT count(*) FROM keep").unwrap();
    assert_eq!(keep.scalar(), Some(&Value::Int(5)));
    let popes = conn
        .query("SELECT count(*) FROM information_schema.tables WHERE table_name = 'popes'")
        .unwrap();
    assert_eq!(popes.scalar(), Some(&Value::Int(0)));
}

#[test]
fn caller_template_cannot_drop_other_tables() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_csv(dir.path());
    let template = dir.path().join("recreate.sql");
    std::fs::write(
        &template,
        "DROP TABLE IF EXISTS accounts;\n\
         CREATE TABLE {table} AS SELECT * FROM read_csv({csv_source}, nullstr = [{null_string}]);\n",
    )
    .unwrap();

    let conn = DuckDbConnection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE accounts (id INTEGER);").unwrap();

    let err = TableLoader::default()
        .recreate(&conn, &CsvTable::new("popes", &csv).with_template(&template))
        .unwrap_err();
    match err {
        sqlgate_lib::GateError::PolicyRejection { rule, .. } => {
            assert_eq!(rule, "drop-table-or-database");
        }
        other => panic!("expected a policy rejection, got {other:?}"),
    }
    assert!(conn.query("SELECT count(*) FROM accounts").is_ok());
}

#[test]
fn failed_load_leaves_no_open_transaction() {
    let conn = DuckDbConnection::open_in_memory().unwrap();
    let err = TableLoader::default()
        .recreate(&conn, &CsvTable::new("popes", "/no/such/popes.csv"))
        .unwrap_err();
    assert!(err.is_execution());

    // The connection is usable for a fresh transaction afterwards
    conn.execute_batch("BEGIN TRANSACTION; CREATE TABLE t (x INTEGER); COMMIT;")
        .unwrap();
}

#[test]
fn empty_table_name_is_rejected() {
    let conn = DuckDbConnection::open_in_memory().unwrap();
    let err = TableLoader::default()
        .recreate(&conn, &CsvTable::new("  ", "popes.csv"))
        .unwrap_err();
    assert_eq!(err.kind(), "config");
}
