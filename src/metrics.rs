// SPDX-License-Identifier: Apache-2.0

//! Process-wide counters for the safety gate.
//!
//! One counter per gate outcome plus execution timings. Everything is a
//! relaxed atomic; readers get an approximate view, which is all the CLI's
//! debug output needs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::executor::GateDecision;

struct GateCounters {
    checked: AtomicU64,
    unchecked: AtomicU64,
    bypassed: AtomicU64,
    rejected: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    elapsed_us_total: AtomicU64,
    elapsed_us_max: AtomicU64,
}

impl GateCounters {
    const fn new() -> Self {
        Self {
            checked: AtomicU64::new(0),
            unchecked: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            elapsed_us_total: AtomicU64::new(0),
            elapsed_us_max: AtomicU64::new(0),
        }
    }

    fn for_decision(&self, decision: GateDecision) -> &AtomicU64 {
        match decision {
            GateDecision::Checked => &self.checked,
            GateDecision::Unchecked => &self.unchecked,
            GateDecision::Bypassed { .. } => &self.bypassed,
        }
    }
}

static COUNTERS: GateCounters = GateCounters::new();

/// Counts a submission the gate let through
pub fn record_gate(decision: GateDecision) {
    COUNTERS.for_decision(decision).fetch_add(1, Ordering::Relaxed);
}

/// Counts a submission the classifier stopped
pub fn record_rejection() {
    COUNTERS.rejected.fetch_add(1, Ordering::Relaxed);
}

/// Counts a submission that reached the connection
pub fn record_execution(elapsed_ms: f64, success: bool) {
    let elapsed_us = (elapsed_ms.max(0.0) * 1000.0) as u64;
    COUNTERS.executed.fetch_add(1, Ordering::Relaxed);
    if !success {
        COUNTERS.failed.fetch_add(1, Ordering::Relaxed);
    }
    COUNTERS
        .elapsed_us_total
        .fetch_add(elapsed_us, Ordering::Relaxed);
    COUNTERS.elapsed_us_max.fetch_max(elapsed_us, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateCounts {
    pub checked: u64,
    pub unchecked: u64,
    pub bypassed: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub gate: GateCounts,
    pub executed: u64,
    pub failed: u64,
    pub mean_ms: Option<f64>,
    pub slowest_ms: f64,
}

pub fn snapshot() -> GateStats {
    let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
    let executed = load(&COUNTERS.executed);
    let total_us = load(&COUNTERS.elapsed_us_total);

    GateStats {
        gate: GateCounts {
            checked: load(&COUNTERS.checked),
            unchecked: load(&COUNTERS.unchecked),
            bypassed: load(&COUNTERS.bypassed),
            rejected: load(&COUNTERS.rejected),
        },
        executed,
        failed: load(&COUNTERS.failed),
        mean_ms: (executed > 0).then(|| total_us as f64 / executed as f64 / 1000.0),
        slowest_ms: load(&COUNTERS.elapsed_us_max) as f64 / 1000.0,
    }
}
