// SPDX-License-Identifier: Apache-2.0

//! Safety Rules
//!
//! The fixed set of dangerous statement shapes. Each rule is an independent
//! predicate over a [`StatementKind`] that either passes or returns a
//! violation message. Order matters only for which violation is reported
//! first.

use std::fmt;

use crate::statement::StatementKind;

/// Predicate over one statement; `Some(message)` means the rule fired
pub type RuleCheck = fn(&StatementKind) -> Option<String>;

/// A named safety rule
#[derive(Clone, Copy)]
pub struct Rule {
    /// Stable identifier used in verdicts and errors
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    pub description: &'static str,
    check: RuleCheck,
}

impl Rule {
    pub const fn new(
        id: &'static str,
        name: &'static str,
        description: &'static str,
        check: RuleCheck,
    ) -> Self {
        Self {
            id,
            name,
            description,
            check,
        }
    }

    pub fn check(&self, kind: &StatementKind) -> Option<String> {
        (self.check)(kind)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub const DROP_TABLE_OR_DATABASE: &str = "drop-table-or-database";
pub const TRUNCATE: &str = "truncate";
pub const ALTER_USER: &str = "alter-user";
pub const UNFILTERED_MUTATION: &str = "unfiltered-mutation";

/// Built-in rules, in evaluation order
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            DROP_TABLE_OR_DATABASE,
            "Block DROP TABLE / DROP DATABASE",
            "Dropping a table or a database destroys data; other object kinds are allowed",
            check_drop,
        ),
        Rule::new(
            TRUNCATE,
            "Block TRUNCATE",
            "TRUNCATE removes every row of its target",
            check_truncate,
        ),
        Rule::new(
            ALTER_USER,
            "Block ALTER USER",
            "Altering a user changes credentials or privileges",
            check_alter_user,
        ),
        Rule::new(
            UNFILTERED_MUTATION,
            "Block UPDATE/DELETE without WHERE",
            "An UPDATE or DELETE without a WHERE clause affects every row of its target",
            check_unfiltered_mutation,
        ),
    ]
}

fn check_drop(kind: &StatementKind) -> Option<String> {
    match kind {
        StatementKind::Drop { object }
            if object.eq_ignore_ascii_case("table") || object.eq_ignore_ascii_case("database") =>
        {
            Some(format!("DROP {} is not allowed", object.to_ascii_uppercase()))
        }
        _ => None,
    }
}

fn check_truncate(kind: &StatementKind) -> Option<String> {
    match kind {
        StatementKind::Command { keyword } if keyword.eq_ignore_ascii_case("truncate") => {
            Some("TRUNCATE is not allowed".to_string())
        }
        _ => None,
    }
}

fn check_alter_user(kind: &StatementKind) -> Option<String> {
    match kind {
        StatementKind::Alter { target } if target.eq_ignore_ascii_case("user") => {
            Some("ALTER USER is not allowed".to_string())
        }
        _ => None,
    }
}

fn check_unfiltered_mutation(kind: &StatementKind) -> Option<String> {
    match kind {
        StatementKind::Update { filtered: false } => {
            Some("UPDATE without a WHERE clause would modify every row".to_string())
        }
        StatementKind::Delete { filtered: false } => {
            Some("DELETE without a WHERE clause would remove every row".to_string())
        }
        _ => None,
    }
}
