// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for sqlgate
//!
//! Two layers:
//! - [`EngineError`] is what a connection reports (open, execute, query).
//! - [`GateError`] is what the gated executor reports to its caller. Every
//!   failure kind of a gated submission is its own variant so callers can
//!   decide whether to retry, change parameters, or abort the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a database connection
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Query syntax error: {message}")]
    SyntaxError { message: String },

    #[error("Query execution error: {message}")]
    ExecutionError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError { message: msg.into() }
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }
}

/// Result type alias for connection operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while rendering a `{name}` template
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no value supplied for placeholder '{{{name}}}'")]
    MissingParameter { name: String },

    #[error("malformed placeholder at byte {offset}: {message}")]
    Malformed { offset: usize, message: String },
}

impl TemplateError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn malformed(offset: usize, msg: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            message: msg.into(),
        }
    }
}

/// Errors surfaced by a gated SQL submission
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateError {
    #[error("Template error in {source_id}: {error}")]
    Template {
        source_id: String,
        error: TemplateError,
    },

    #[error("SQL parse error: {message}")]
    Parse { message: String },

    #[error("Rejected by safety policy [{rule}]: {reason}")]
    PolicyRejection { rule: String, reason: String },

    #[error("Execution of {source_id} failed: {message}")]
    Execution { source_id: String, message: String },

    #[error("Cannot read SQL source {path}: {message}")]
    Source { path: String, message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl GateError {
    pub fn template(source_id: impl Into<String>, error: TemplateError) -> Self {
        Self::Template {
            source_id: source_id.into(),
            error,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse { message: msg.into() }
    }

    pub fn policy_rejection(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyRejection {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(source_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Execution {
            source_id: source_id.into(),
            message: msg.into(),
        }
    }

    pub fn unreadable_source(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Source {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection { message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub const fn is_template(&self) -> bool {
        matches!(self, Self::Template { .. })
    }

    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub const fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::PolicyRejection { .. })
    }

    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Short stable name of the error kind, used in logs and CLI output
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Parse { .. } => "parse",
            Self::PolicyRejection { .. } => "policy_rejection",
            Self::Execution { .. } => "execution",
            Self::Source { .. } => "source",
            Self::Connection { .. } => "connection",
            Self::Config { .. } => "config",
        }
    }
}

impl From<EngineError> for GateError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ConnectionFailed { message } => Self::Connection { message },
            other => Self::Execution {
                source_id: "<unknown>".to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for gated operations
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_error_names_placeholder() {
        let err = TemplateError::missing("table");
        assert_eq!(err.to_string(), "no value supplied for placeholder '{table}'");
    }

    #[test]
    fn gate_error_kinds_are_distinct() {
        let errors = [
            GateError::template("a.sql", TemplateError::missing("x")),
            GateError::parse("bad"),
            GateError::policy_rejection("truncate", "no"),
            GateError::execution("a.sql", "boom"),
        ];
        let kinds: Vec<_> = errors.iter().map(GateError::kind).collect();
        assert_eq!(kinds, ["template", "parse", "policy_rejection", "execution"]);
        assert!(errors[0].is_template());
        assert!(errors[1].is_parse());
        assert!(errors[2].is_policy_rejection());
        assert!(errors[3].is_execution());
    }

    #[test]
    fn policy_rejection_display_carries_rule_and_reason() {
        let err = GateError::policy_rejection("drop-table-or-database", "DROP TABLE accounts");
        let text = err.to_string();
        assert!(text.contains("drop-table-or-database"));
        assert!(text.contains("DROP TABLE accounts"));
    }

    #[test]
    fn engine_connection_failure_maps_to_connection_kind() {
        let err: GateError = EngineError::connection_failed("no such file").into();
        assert_eq!(err.kind(), "connection");
    }

    #[test]
    fn gate_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(GateError::parse("unexpected token")).unwrap();
        assert_eq!(json["kind"], "parse");
        assert_eq!(json["message"], "unexpected token");
    }
}
