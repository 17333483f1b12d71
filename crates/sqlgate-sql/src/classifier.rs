// SPDX-License-Identifier: Apache-2.0

//! SQL Safety Classifier
//!
//! Parses a submission, then runs every statement through the rule set.
//! Unparseable text is unsafe. A submission is safe only when every rule
//! passes for every statement.

use serde::Serialize;
use sqlgate_core::{GateError, GateResult};
use tracing::{debug, warn};

use crate::dialect::SqlDialect;
use crate::rules::{builtin_rules, Rule};
use crate::statement::{parse_statements, ParsedStatement};

/// Rule id reported when the text could not be parsed
pub const PARSE_ERROR: &str = "parse-error";

/// Outcome of classifying one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the submission may be executed
    pub safe: bool,
    /// Rule that fired (if any); [`PARSE_ERROR`] for unparseable text
    pub triggered_rule: Option<String>,
    /// 1-based position of the offending statement
    pub statement: Option<usize>,
    /// Human-readable explanation
    pub reason: Option<String>,
}

impl Verdict {
    pub fn safe() -> Self {
        Self {
            safe: true,
            triggered_rule: None,
            statement: None,
            reason: None,
        }
    }

    pub fn rejected(rule: &Rule, statement: &ParsedStatement, message: String) -> Self {
        Self {
            safe: false,
            triggered_rule: Some(rule.id.to_string()),
            statement: Some(statement.position),
            reason: Some(rejection_reason(rule, statement, &message)),
        }
    }

    pub fn unparseable(message: impl Into<String>) -> Self {
        Self {
            safe: false,
            triggered_rule: Some(PARSE_ERROR.to_string()),
            statement: None,
            reason: Some(format!("SQL could not be parsed: {}", message.into())),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    pub fn is_parse_failure(&self) -> bool {
        self.triggered_rule.as_deref() == Some(PARSE_ERROR)
    }

    /// Converts an unsafe verdict into the matching gate error
    pub fn into_error(self) -> Option<GateError> {
        if self.safe {
            return None;
        }
        let reason = self.reason.unwrap_or_default();
        Some(match self.triggered_rule {
            Some(rule) if rule != PARSE_ERROR => GateError::policy_rejection(rule, reason),
            _ => GateError::parse(reason),
        })
    }
}

/// One rule that fired on one statement
#[derive(Debug, Clone)]
pub struct Violation {
    pub rule: Rule,
    pub statement: ParsedStatement,
    pub message: String,
}

impl Violation {
    pub fn reason(&self) -> String {
        rejection_reason(&self.rule, &self.statement, &self.message)
    }

    pub fn into_error(self) -> GateError {
        let reason = self.reason();
        GateError::policy_rejection(self.rule.id, reason)
    }
}

impl From<Violation> for Verdict {
    fn from(violation: Violation) -> Self {
        Verdict::rejected(&violation.rule, &violation.statement, violation.message)
    }
}

fn rejection_reason(rule: &Rule, statement: &ParsedStatement, message: &str) -> String {
    format!("{statement} violates rule '{}': {message}", rule.id)
}

/// Classifier bound to a dialect and an ordered rule set
#[derive(Debug, Clone)]
pub struct SqlClassifier {
    dialect: SqlDialect,
    rules: Vec<Rule>,
}

impl SqlClassifier {
    /// Creates a classifier with the built-in rules
    pub fn new(dialect: SqlDialect) -> Self {
        Self::with_rules(dialect, builtin_rules())
    }

    /// Creates a classifier with a caller-supplied rule list
    pub fn with_rules(dialect: SqlDialect, rules: Vec<Rule>) -> Self {
        Self { dialect, rules }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Parses `sql` into statement nodes
    pub fn parse(&self, sql: &str) -> GateResult<Vec<ParsedStatement>> {
        parse_statements(sql, self.dialect).map_err(|e| GateError::parse(e.to_string()))
    }

    /// Classifies a whole submission
    pub fn classify(&self, sql: &str) -> Verdict {
        let statements = match parse_statements(sql, self.dialect) {
            Ok(statements) => statements,
            Err(e) => {
                warn!(dialect = %self.dialect, error = %e, "SQL could not be parsed; treating as unsafe");
                return Verdict::unparseable(e.to_string());
            }
        };

        match self.violations(&statements).into_iter().next() {
            Some(violation) => {
                debug!(
                    rule = violation.rule.id,
                    position = violation.statement.position,
                    kind = %violation.statement.kind.label(),
                    "Safety rule triggered"
                );
                violation.into()
            }
            None => {
                debug!(statements = statements.len(), "SQL classified as safe");
                Verdict::safe()
            }
        }
    }

    /// Every rule hit, in statement order then rule order
    pub fn violations(&self, statements: &[ParsedStatement]) -> Vec<Violation> {
        statements
            .iter()
            .flat_map(|statement| {
                self.rules.iter().filter_map(move |rule| {
                    rule.check(&statement.kind).map(|message| Violation {
                        rule: *rule,
                        statement: statement.clone(),
                        message,
                    })
                })
            })
            .collect()
    }
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new(SqlDialect::default())
    }
}

/// Classifies `sql` with the default (DuckDB) dialect and built-in rules
pub fn classify(sql: &str) -> Verdict {
    SqlClassifier::default().classify(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ALTER_USER, DROP_TABLE_OR_DATABASE, TRUNCATE, UNFILTERED_MUTATION};

    fn rule_of(sql: &str) -> Option<String> {
        classify(sql).triggered_rule
    }

    #[test]
    fn drop_table_is_unsafe_and_named() {
        let verdict = classify("DROP TABLE accounts;");
        assert!(!verdict.is_safe());
        assert_eq!(verdict.triggered_rule.as_deref(), Some(DROP_TABLE_OR_DATABASE));
        assert_eq!(verdict.statement, Some(1));
        assert!(verdict.reason.unwrap().contains("DROP TABLE"));
    }

    #[test]
    fn drop_table_any_casing_is_unsafe() {
        for sql in ["drop table accounts", "Drop Table IF EXISTS accounts", "DROP\n\tTABLE accounts"] {
            assert!(!classify(sql).is_safe(), "{sql}");
        }
    }

    #[test]
    fn drop_database_is_unsafe() {
        assert_eq!(
            rule_of("DROP DATABASE papal_data").as_deref(),
            Some(DROP_TABLE_OR_DATABASE)
        );
    }

    #[test]
    fn drop_sequence_is_safe() {
        assert!(classify("DROP SEQUENCE seq_popes;").is_safe());
    }

    #[test]
    fn truncate_is_unsafe() {
        assert_eq!(rule_of("truncate popes").as_deref(), Some(TRUNCATE));
        assert_eq!(rule_of("TRUNCATE TABLE popes;").as_deref(), Some(TRUNCATE));
    }

    #[test]
    fn alter_user_is_unsafe() {
        assert_eq!(rule_of("ALTER USER admin RENAME TO bob").as_deref(), Some(ALTER_USER));
        assert_eq!(
            rule_of("ALTER USER admin SET search_path = x").as_deref(),
            Some(ALTER_USER)
        );
    }

    #[test]
    fn alter_user_with_password_fails_to_parse() {
        let verdict = classify("ALTER USER admin WITH PASSWORD 'x';");
        assert!(!verdict.is_safe());
        assert_eq!(verdict.triggered_rule.as_deref(), Some(PARSE_ERROR));
    }

    #[test]
    fn alter_table_is_safe() {
        assert!(classify("ALTER TABLE popes ADD COLUMN notes VARCHAR;").is_safe());
        assert!(classify("ALTER TABLE popes RENAME TO popes_archive;").is_safe());
    }

    #[test]
    fn update_with_where_is_safe() {
        assert!(classify("UPDATE popes SET age_end = 90 WHERE id = 5;").is_safe());
    }

    #[test]
    fn update_without_where_is_unsafe() {
        assert_eq!(
            rule_of("UPDATE popes SET age_end = 90;").as_deref(),
            Some(UNFILTERED_MUTATION)
        );
    }

    #[test]
    fn delete_requires_where() {
        assert_eq!(rule_of("DELETE FROM popes").as_deref(), Some(UNFILTERED_MUTATION));
        assert!(classify("DELETE FROM popes WHERE number > 266").is_safe());
    }

    #[test]
    fn comments_cannot_hide_a_drop() {
        let sql = "/* harmless */ DROP -- really\n TABLE accounts";
        assert_eq!(rule_of(sql).as_deref(), Some(DROP_TABLE_OR_DATABASE));
    }

    #[test]
    fn keywords_inside_literals_are_not_statements() {
        let sql = "SELECT 'DROP TABLE accounts; TRUNCATE popes' AS note";
        assert!(classify(sql).is_safe());
    }

    #[test]
    fn one_bad_statement_taints_the_submission() {
        let sql = "SELECT 1; UPDATE popes SET age_end = 88 WHERE name = 'Francis'; DELETE FROM popes;";
        let verdict = classify(sql);
        assert!(!verdict.is_safe());
        assert_eq!(verdict.statement, Some(3));
    }

    #[test]
    fn unparseable_text_fails_closed() {
        let verdict = classify("SELEC * FORM popes WHERE");
        assert!(!verdict.is_safe());
        assert!(verdict.is_parse_failure());
        assert!(verdict.reason.unwrap().contains("could not be parsed"));
    }

    #[test]
    fn empty_submission_is_safe() {
        assert!(classify("").is_safe());
        assert!(classify("  -- nothing here\n").is_safe());
    }

    #[test]
    fn csv_table_creation_is_safe() {
        let sql = r#"
            CREATE OR REPLACE TABLE popes AS
            SELECT number, name, CAST("end" AS DATE) AS reign_end
            FROM read_csv('popes.csv', nullstr = ['NA']);
        "#;
        assert!(classify(sql).is_safe());
    }

    #[test]
    fn into_error_maps_to_distinct_kinds() {
        let rejected = classify("DROP TABLE popes").into_error().unwrap();
        assert!(rejected.is_policy_rejection());

        let unparseable = classify("DROP TABLE").into_error().unwrap();
        assert!(unparseable.is_parse());

        assert!(classify("SELECT 1").into_error().is_none());
    }

    #[test]
    fn violations_lists_every_hit_in_order() {
        let classifier = SqlClassifier::default();
        let statements = classifier
            .parse("DROP TABLE a; SELECT 1; DELETE FROM b; DROP SEQUENCE s")
            .unwrap();
        let hits: Vec<_> = classifier
            .violations(&statements)
            .into_iter()
            .map(|v| (v.rule.id, v.statement.position))
            .collect();
        assert_eq!(hits, vec![(DROP_TABLE_OR_DATABASE, 1), (UNFILTERED_MUTATION, 3)]);
    }

    #[test]
    fn violation_error_matches_verdict_error() {
        let classifier = SqlClassifier::default();
        let statements = classifier.parse("TRUNCATE popes").unwrap();
        let violation = classifier.violations(&statements).remove(0);
        assert_eq!(
            violation.clone().into_error(),
            Verdict::from(violation).into_error().unwrap()
        );
    }

    #[test]
    fn custom_rule_list_is_respected() {
        let classifier = SqlClassifier::with_rules(SqlDialect::Generic, Vec::new());
        assert!(classifier.classify("DROP TABLE popes").is_safe());
        assert_eq!(classifier.dialect(), SqlDialect::Generic);
    }
}
