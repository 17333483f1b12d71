// SPDX-License-Identifier: Apache-2.0

//! sqlgate SQL layer: dialect selection, structural statement model,
//! safety rules, the classifier, and `{name}` templates.

pub mod classifier;
pub mod dialect;
pub mod rules;
pub mod statement;
pub mod template;

pub use classifier::{classify, SqlClassifier, Verdict, Violation, PARSE_ERROR};
pub use dialect::SqlDialect;
pub use rules::{builtin_rules, Rule};
pub use statement::{parse_statements, preview, ParsedStatement, StatementKind};
pub use template::{Params, SqlTemplate};
