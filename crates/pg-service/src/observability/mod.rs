//! Observability for the registry service.
//!
//! # Privacy by Default
//!
//! Actor loops use `#[instrument(skip_all)]` with explicit fields. Group keys
//! and member IDs appear in logs but never as metric labels. Labels are
//! bounded:
//! - `operation`: 6 values (join, leave, members, which_groups, status, shutdown)
//! - `error_type`: 3 values (registry_unavailable, timeout, member_unreachable)
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `pg_groups_active` | Gauge | none | Groups with at least one occurrence |
//! | `pg_members_monitored` | Gauge | none | Distinct members holding a monitor |
//! | `pg_registry_mailbox_depth` | Gauge | none | Backpressure indicator |
//! | `pg_joins_total` | Counter | none | Processed joins |
//! | `pg_leaves_total` | Counter | none | Occurrences removed by leave |
//! | `pg_evictions_total` | Counter | none | Members evicted on termination |
//! | `pg_stale_down_notices_total` | Counter | none | Ignored termination notices |
//! | `pg_registry_restarts_total` | Counter | none | Supervised restarts |
//! | `pg_call_latency_seconds` | Histogram | `operation` | Caller round trip |
//! | `pg_errors_total` | Counter | `operation`, `error_type` | Failed calls |

pub mod health;
pub mod metrics;

// Re-exports for convenience
pub use health::{health_router, HealthState, ProbeState};
pub use metrics::init_metrics_recorder;
