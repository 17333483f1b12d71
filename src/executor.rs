// SPDX-License-Identifier: Apache-2.0

//! Gated Executor
//!
//! Runs SQL text against a caller-owned connection, subject to the safety
//! gate. Every submission goes through the same ordered steps:
//! 1. Template substitution (only when parameters are supplied)
//! 2. Gate: bypass, classification, or an explicit opt-out
//! 3. Execution on the connection
//!
//! Classification and execution always see the same rendered text.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlgate_core::{ExecutionId, GateError, GateResult, QueryResult, SqlConnection};
use sqlgate_sql::{Params, SqlClassifier, SqlTemplate, Verdict};
use tracing::{debug, error, info, warn};

use crate::metrics;

/// Permission to skip classification for one submission.
///
/// Only constructible through [`SafetyBypass::trusted`], so every call site
/// that disables the gate names itself and can be found by searching for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyBypass {
    caller: &'static str,
}

impl SafetyBypass {
    pub const fn trusted(caller: &'static str) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &'static str {
        self.caller
    }
}

/// Per-submission options
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Run the classifier before executing (default `true`)
    pub check_safety: bool,
    /// Placeholder values; `None` means the text is used verbatim
    pub params: Option<Params>,
    bypass: Option<SafetyBypass>,
}

impl ExecuteOptions {
    pub fn checked() -> Self {
        Self {
            check_safety: true,
            params: None,
            bypass: None,
        }
    }

    /// Disables classification; the decision is still logged
    pub fn unchecked() -> Self {
        Self {
            check_safety: false,
            ..Self::checked()
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_bypass(mut self, bypass: SafetyBypass) -> Self {
        self.bypass = Some(bypass);
        self
    }

    pub fn bypass(&self) -> Option<SafetyBypass> {
        self.bypass
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::checked()
    }
}

/// How the gate let a submission through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Classified and found safe
    Checked,
    /// Classification disabled by the caller
    Unchecked,
    /// Skipped through a named bypass
    Bypassed { caller: &'static str },
}

/// Outcome of one executed submission
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub execution_id: ExecutionId,
    pub source_id: String,
    /// The exact text sent to the connection
    pub sql: String,
    pub gate: GateDecision,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

/// Runs SQL files and text through the safety gate
#[derive(Debug, Clone, Default)]
pub struct GatedExecutor {
    classifier: SqlClassifier,
}

impl GatedExecutor {
    pub fn new(classifier: SqlClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &SqlClassifier {
        &self.classifier
    }

    /// Reads `path` and runs its contents; the path is the source identifier
    pub fn run_file(
        &self,
        conn: &dyn SqlConnection,
        path: impl AsRef<Path>,
        options: &ExecuteOptions,
    ) -> GateResult<ExecutionReport> {
        let template = SqlTemplate::load(path)?;
        self.run_template(conn, &template, options)
    }

    /// Runs in-memory SQL text under the given source identifier
    pub fn run_sql(
        &self,
        conn: &dyn SqlConnection,
        source_id: &str,
        sql: &str,
        options: &ExecuteOptions,
    ) -> GateResult<ExecutionReport> {
        self.run_template(conn, &SqlTemplate::new(source_id, sql), options)
    }

    pub fn run_template(
        &self,
        conn: &dyn SqlConnection,
        template: &SqlTemplate,
        options: &ExecuteOptions,
    ) -> GateResult<ExecutionReport> {
        let execution_id = ExecutionId::new();
        let started_at = Utc::now();
        let source_id = template.source_id();

        let sql = self.render(template, options)?;
        let gate = self.gate(source_id, &sql, options)?;

        let start = Instant::now();
        let outcome = conn.execute_batch(&sql);
        let elapsed_ms = start.elapsed().as_micros() as f64 / 1000.0;
        metrics::record_execution(elapsed_ms, outcome.is_ok());

        if let Err(e) = outcome {
            error!(
                execution_id = %execution_id,
                source = source_id,
                engine = conn.engine_id(),
                error = %e,
                "SQL execution failed"
            );
            return Err(GateError::execution(source_id, e.to_string()));
        }

        info!(
            execution_id = %execution_id,
            source = source_id,
            engine = conn.engine_id(),
            elapsed_ms,
            "SQL executed"
        );

        Ok(ExecutionReport {
            execution_id,
            source_id: source_id.to_string(),
            sql,
            gate,
            started_at,
            elapsed_ms,
        })
    }

    /// Final SQL text of a template: substituted when parameters are given,
    /// verbatim otherwise
    pub fn render(&self, template: &SqlTemplate, options: &ExecuteOptions) -> GateResult<String> {
        match &options.params {
            Some(params) => template.render(params).map_err(|e| {
                warn!(source = template.source_id(), error = %e, "SQL template could not be rendered");
                GateError::template(template.source_id(), e)
            }),
            None => Ok(template.text().to_string()),
        }
    }

    /// Classifies rendered text without executing it
    pub fn check(&self, template: &SqlTemplate, options: &ExecuteOptions) -> GateResult<Verdict> {
        let sql = self.render(template, options)?;
        Ok(self.classifier.classify(&sql))
    }

    /// Runs a read-only verification query; the query is always classified
    pub fn query(
        &self,
        conn: &dyn SqlConnection,
        source_id: &str,
        sql: &str,
    ) -> GateResult<QueryResult> {
        self.gate(source_id, sql, &ExecuteOptions::checked())?;
        conn.query(sql).map_err(|e| {
            error!(source = source_id, engine = conn.engine_id(), error = %e, "Verification query failed");
            GateError::execution(source_id, e.to_string())
        })
    }

    fn gate(&self, source_id: &str, sql: &str, options: &ExecuteOptions) -> GateResult<GateDecision> {
        let decision = self.decide(source_id, sql, options)?;
        metrics::record_gate(decision);
        Ok(decision)
    }

    fn decide(&self, source_id: &str, sql: &str, options: &ExecuteOptions) -> GateResult<GateDecision> {
        if let Some(bypass) = options.bypass {
            warn!(
                source = source_id,
                caller = bypass.caller(),
                "Safety check bypassed"
            );
            return Ok(GateDecision::Bypassed {
                caller: bypass.caller(),
            });
        }

        if !options.check_safety {
            info!(source = source_id, "Safety check disabled for this submission");
            return Ok(GateDecision::Unchecked);
        }

        let verdict = self.classifier.classify(sql);
        let rule = verdict.triggered_rule.clone();
        match verdict.into_error() {
            None => {
                debug!(source = source_id, "SQL passed safety check");
                Ok(GateDecision::Checked)
            }
            Some(err) => {
                warn!(
                    source = source_id,
                    rule = rule.as_deref().unwrap_or_default(),
                    error = %err,
                    "SQL rejected by safety check"
                );
                metrics::record_rejection();
                Err(err)
            }
        }
    }
}
