// SPDX-License-Identifier: Apache-2.0

//! Structural statement model.
//!
//! Parses SQL text with `sqlparser` and reduces every statement node to the
//! handful of attributes the safety rules consult. Kinds come from the AST
//! variant. Statements without a dedicated variant are keyed on the leading
//! keywords of the parser's own rendering of the node, never of the raw input,
//! so comments, casing and whitespace in the submitted text play no part.

use std::fmt;

use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::Dialect;
use sqlparser::parser::{Parser, ParserError, ParserOptions};
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::dialect::SqlDialect;

const SQL_RECURSION_LIMIT: usize = 256;

/// Structural category of one parsed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// `DROP <object> ...`; `object` is the dropped object kind, e.g. `TABLE`
    Drop { object: String },
    /// A statement the rule set only knows by its leading keyword, e.g. `TRUNCATE`
    Command { keyword: String },
    /// `ALTER <target> ...`; `target` is the altered object kind, e.g. `USER`
    Alter { target: String },
    Update { filtered: bool },
    Delete { filtered: bool },
    Other,
}

impl StatementKind {
    pub fn label(&self) -> String {
        match self {
            Self::Drop { object } => format!("DROP {}", object.to_ascii_uppercase()),
            Self::Command { keyword } => keyword.to_ascii_uppercase(),
            Self::Alter { target } => format!("ALTER {}", target.to_ascii_uppercase()),
            Self::Update { .. } => "UPDATE".to_string(),
            Self::Delete { .. } => "DELETE".to_string(),
            Self::Other => "OTHER".to_string(),
        }
    }
}

/// One statement of a (possibly multi-statement) submission
#[derive(Debug, Clone, Serialize)]
pub struct ParsedStatement {
    /// 1-based position within the submitted text
    pub position: usize,
    /// Canonical rendering of the statement node
    pub sql: String,
    pub kind: StatementKind,
    /// Names of the dropped objects, as rendered by the parser; empty for
    /// anything but a DROP
    pub objects: Vec<String>,
}

impl fmt::Display for ParsedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement {} ({})", self.position, preview(&self.sql))
    }
}

/// Parses `sql` into statement nodes using the given dialect
pub fn parse_statements(
    sql: &str,
    dialect: SqlDialect,
) -> Result<Vec<ParsedStatement>, ParserError> {
    let dialect = dialect.parser_dialect();
    let statements = Parser::new(&*dialect)
        .with_options(ParserOptions::new().with_trailing_commas(true))
        .with_recursion_limit(SQL_RECURSION_LIMIT)
        .try_with_sql(sql)?
        .parse_statements()?;

    Ok(statements
        .iter()
        .enumerate()
        .map(|(idx, statement)| {
            let rendered = statement.to_string();
            ParsedStatement {
                position: idx + 1,
                kind: classify_statement(statement, &rendered, &*dialect),
                objects: dropped_objects(statement),
                sql: rendered,
            }
        })
        .collect())
}

fn classify_statement(statement: &Statement, rendered: &str, dialect: &dyn Dialect) -> StatementKind {
    match statement {
        Statement::Drop { object_type, .. } => StatementKind::Drop {
            object: object_type.to_string(),
        },
        Statement::Truncate { .. } => StatementKind::Command {
            keyword: "TRUNCATE".to_string(),
        },
        Statement::Update(update) => StatementKind::Update {
            filtered: update.selection.is_some(),
        },
        Statement::Delete(delete) => StatementKind::Delete {
            filtered: delete.selection.is_some(),
        },
        Statement::Query(_)
        | Statement::Insert(_)
        | Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. } => StatementKind::Other,
        _ => classify_by_keywords(&leading_keywords(rendered, dialect)),
    }
}

fn dropped_objects(statement: &Statement) -> Vec<String> {
    match statement {
        Statement::Drop { names, .. } => names.iter().map(ToString::to_string).collect(),
        _ => Vec::new(),
    }
}

fn classify_by_keywords(words: &[String]) -> StatementKind {
    match words {
        [first, target, ..] if first == "ALTER" => StatementKind::Alter {
            target: target.clone(),
        },
        [first, ..] => StatementKind::Command {
            keyword: first.clone(),
        },
        [] => StatementKind::Other,
    }
}

/// Uppercased word tokens at the start of a rendered statement
fn leading_keywords(rendered: &str, dialect: &dyn Dialect) -> Vec<String> {
    const MAX_WORDS: usize = 2;

    match Tokenizer::new(dialect, rendered).tokenize() {
        Ok(tokens) => tokens
            .iter()
            .filter_map(|tok| match tok {
                Token::Word(word) => Some(word.value.to_ascii_uppercase()),
                _ => None,
            })
            .take(MAX_WORDS)
            .collect(),
        Err(_) => rendered
            .split_whitespace()
            .take(MAX_WORDS)
            .map(str::to_ascii_uppercase)
            .collect(),
    }
}

/// Single-line, length-capped form of a statement for messages
pub fn preview(sql: &str) -> String {
    const MAX_CHARS: usize = 120;

    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_CHARS {
        flat
    } else {
        let mut cut: String = flat.chars().take(MAX_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
