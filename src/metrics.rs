//! Engine metrics.
//!
//! Recorded through the `metrics` facade; the library never installs a
//! recorder, so these are no-ops until the embedding application does.
//!
//! ## Metrics
//!
//! ### Counters
//! - `flowtoll_runs_total` - Runs by workflow and status
//! - `flowtoll_steps_executed_total` - Step executions by kind and status
//! - `flowtoll_step_retries_total` - Retried step attempts by kind
//!
//! ### Histograms
//! - `flowtoll_run_duration_seconds` - Run duration by workflow
//! - `flowtoll_step_duration_seconds` - Step duration by kind
//! - `flowtoll_run_cost` - Charged total per run by workflow

use metrics::{counter, histogram};
use std::time::Duration;

// =============================================================================
// Run Metrics
// =============================================================================

/// Record a finished run.
pub fn record_run(workflow_name: &str, status: &str) {
    counter!(
        "flowtoll_runs_total",
        "workflow" => workflow_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record run duration.
pub fn record_run_duration(duration: Duration, workflow_name: &str) {
    histogram!(
        "flowtoll_run_duration_seconds",
        "workflow" => workflow_name.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the amount charged for a run.
pub fn record_run_cost(total_cost: f64, workflow_name: &str) {
    histogram!(
        "flowtoll_run_cost",
        "workflow" => workflow_name.to_string()
    )
    .record(total_cost);
}

// =============================================================================
// Step Metrics
// =============================================================================

/// Record a step outcome.
pub fn record_step_execution(kind: &str, status: &str) {
    counter!(
        "flowtoll_steps_executed_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record step duration, retries included.
pub fn record_step_duration(duration: Duration, kind: &str) {
    histogram!(
        "flowtoll_step_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_step_retry(kind: &str) {
    counter!(
        "flowtoll_step_retries_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}
