use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlgate_core::{GateError, QueryResult};
use sqlgate_lib::config::GateConfig;
use sqlgate_lib::executor::ExecuteOptions;
use sqlgate_lib::loader::{CsvTable, TableLoader};
use sqlgate_lib::{executor_for, metrics, observability, open_database, SqlTemplate};
use sqlgate_sql::Params;

/// Exit status for SQL stopped by the safety gate
const EXIT_UNSAFE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "sqlgate")]
#[command(about = "Run SQL scripts against DuckDB behind a safety gate", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// DuckDB database file, or :memory:
    #[arg(long, global = true)]
    database: Option<String>,

    /// SQL dialect used for safety classification
    #[arg(long, global = true)]
    dialect: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a SQL file without running it
    Check {
        file: PathBuf,

        /// Template parameter (key=value), repeatable
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Run a SQL file through the safety gate
    Run {
        file: PathBuf,

        /// Template parameter (key=value), repeatable
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Execute without classifying the SQL first
        #[arg(long)]
        no_safety_check: bool,
    },

    /// Recreate a table from a CSV file or URL
    Load {
        /// Target table name
        #[arg(long)]
        table: String,

        /// CSV path or URL readable by DuckDB
        #[arg(long)]
        csv: String,

        /// Recreation script using {table}, {csv_source} and {null_string}
        #[arg(long)]
        template: Option<PathBuf>,

        /// Cell text read as NULL
        #[arg(long, default_value = "NA")]
        null_string: String,
    },

    /// Run a read-only verification query
    Query {
        sql: String,

        /// Maximum rows to print
        #[arg(short = 'l', long, default_value = "20")]
        limit: usize,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn to_params(pairs: Vec<(String, String)>) -> Option<Params> {
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.into_iter().collect())
    }
}

fn with_params(options: ExecuteOptions, pairs: Vec<(String, String)>) -> ExecuteOptions {
    match to_params(pairs) {
        Some(params) => options.with_params(params),
        None => options,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let json = args.json;

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            let gate_error = err.downcast_ref::<GateError>();
            if json {
                match gate_error {
                    Some(e) => print_json(&serde_json::json!({ "ok": false, "error": e })),
                    None => print_json(&serde_json::json!({ "ok": false, "error": err.to_string() })),
                }
            } else {
                eprintln!("error: {err:#}");
            }
            match gate_error {
                Some(e) if e.is_policy_rejection() || e.is_parse() => ExitCode::from(EXIT_UNSAFE),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    // Load configuration with precedence: CLI > env > file > defaults
    let mut config = GateConfig::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(dialect) = args.dialect {
        config.dialect = dialect.parse()?;
    }

    observability::init_tracing(&config.logging);
    tracing::debug!(?config, "Configuration resolved");

    let executor = executor_for(&config);

    let code = match args.command {
        Command::Check { file, params } => {
            let template = SqlTemplate::load(config.resolve_sql_path(&file))?;
            let options = with_params(ExecuteOptions::checked(), params);
            let verdict = executor.check(&template, &options)?;

            if args.json {
                print_json(&verdict);
            } else if verdict.is_safe() {
                println!("{}: safe", template.source_id());
            } else {
                println!(
                    "{}: UNSAFE ({})",
                    template.source_id(),
                    verdict.reason.as_deref().unwrap_or("no reason given")
                );
            }

            if verdict.is_safe() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_UNSAFE)
            }
        }

        Command::Run {
            file,
            params,
            no_safety_check,
        } => {
            let conn = open_database(&config)?;
            let mut options = with_params(ExecuteOptions::checked(), params);
            options.check_safety = config.check_safety && !no_safety_check;
            let report = executor.run_file(&conn, config.resolve_sql_path(&file), &options)?;

            if args.json {
                print_json(&report);
            } else {
                println!(
                    "{}: executed in {:.1} ms ({:?})",
                    report.source_id, report.elapsed_ms, report.gate
                );
            }
            ExitCode::SUCCESS
        }

        Command::Load {
            table,
            csv,
            template,
            null_string,
        } => {
            let conn = open_database(&config)?;
            let mut source = CsvTable::new(table, csv).with_null_string(null_string);
            if let Some(path) = template {
                source = source.with_template(config.resolve_sql_path(&path));
            }
            let report = TableLoader::new(executor).recreate(&conn, &source)?;

            if args.json {
                print_json(&report);
            } else {
                println!("{}: {} rows loaded", report.table, report.row_count);
            }
            ExitCode::SUCCESS
        }

        Command::Query { sql, limit } => {
            let conn = open_database(&config)?;
            let result = executor.query(&conn, "<command line>", &sql)?;

            if args.json {
                print_json(&result);
            } else {
                print_table(&result, limit);
            }
            ExitCode::SUCCESS
        }
    };

    tracing::debug!(metrics = ?metrics::snapshot(), "Gate metrics");
    Ok(code)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}

fn print_table(result: &QueryResult, limit: usize) {
    let shown: Vec<Vec<String>> = result
        .rows
        .iter()
        .take(limit)
        .map(|row| row.values.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.chars().count()).collect();
    for row in &shown {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
        .collect();
    println!("{}", header.join(" | "));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );
    for row in &shown {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("{}", cells.join(" | "));
    }

    if result.rows.len() > shown.len() {
        println!("... {} more rows", result.rows.len() - shown.len());
    }
    println!("({} rows, {:.1} ms)", result.rows.len(), result.execution_time_ms);
}
