//! Metrics definitions for the process-group registry
//!
//! All metrics follow Prometheus naming conventions:
//! - `pg_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: join, leave, members, which_groups, status, shutdown (6 values)
//! - `error_type`: registry_unavailable, timeout, member_unreachable (3 values)
//!
//! Group keys and member IDs are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Call latency buckets
/// are tuned for an in-process actor round trip (p99 well under 10ms).
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("pg_call_latency".to_string()),
            &[
                0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.005, 0.010, 0.050, 0.100, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set call latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Registry State (Gauges)
// ============================================================================

/// Set the number of groups with at least one occurrence.
///
/// Metric: `pg_groups_active`
pub fn set_groups_active(count: usize) {
    // usize to f64 conversion is safe for realistic group counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("pg_groups_active").set(count as f64);
}

/// Set the number of distinct members holding a liveness monitor.
///
/// Metric: `pg_members_monitored`
pub fn set_members_monitored(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("pg_members_monitored").set(count as f64);
}

/// Set the registry mailbox depth.
///
/// Metric: `pg_registry_mailbox_depth`
///
/// High values indicate the registry is falling behind.
pub fn set_registry_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("pg_registry_mailbox_depth").set(depth as f64);
}

// ============================================================================
// Membership Events (Counters)
// ============================================================================

/// Record a processed join.
///
/// Metric: `pg_joins_total`
pub fn record_join() {
    counter!("pg_joins_total").increment(1);
}

/// Record occurrences removed by a processed leave.
///
/// Metric: `pg_leaves_total`
pub fn record_leaves(removed: u64) {
    counter!("pg_leaves_total").increment(removed);
}

/// Record an eviction caused by member termination.
///
/// Metric: `pg_evictions_total`
pub fn record_eviction() {
    counter!("pg_evictions_total").increment(1);
}

/// Record a stale or duplicate termination notice.
///
/// Metric: `pg_stale_down_notices_total`
pub fn record_stale_down_notice() {
    counter!("pg_stale_down_notices_total").increment(1);
}

/// Record a supervised registry restart.
///
/// Metric: `pg_registry_restarts_total`
///
/// Every restart discards all group state.
pub fn record_registry_restart() {
    counter!("pg_registry_restarts_total").increment(1);
}

// ============================================================================
// Caller Side (Histograms, Counters)
// ============================================================================

/// Record a registry call's round-trip latency.
///
/// Metric: `pg_call_latency_seconds`
/// Labels: `operation`
pub fn record_call_latency(operation: &'static str, duration: Duration) {
    histogram!("pg_call_latency_seconds", "operation" => operation).record(duration.as_secs_f64());
}

/// Record a failed registry call.
///
/// Metric: `pg_errors_total`
/// Labels: `operation`, `error_type`
pub fn record_error(operation: &'static str, error_type: &'static str) {
    counter!("pg_errors_total",
        "operation" => operation,
        "error_type" => error_type
    )
    .increment(1);
}
