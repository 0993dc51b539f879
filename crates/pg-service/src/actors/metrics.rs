//! Mailbox monitoring for the registry actor.
//!
//! | Level    | Depth     |
//! |----------|-----------|
//! | Normal   | <= 100    |
//! | Warning  | 101-500   |
//! | Critical | > 500     |
//!
//! The depth is sampled from the receiver each time the actor takes a message,
//! so it counts requests still queued behind the one being processed.

use crate::observability::metrics::set_registry_mailbox_depth;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth at or below which the registry is considered healthy.
pub const REGISTRY_MAILBOX_NORMAL: usize = 100;

/// Mailbox depth above which the registry is considered overloaded.
pub const REGISTRY_MAILBOX_WARNING: usize = 500;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Tracks queue depth and throughput for one registry actor.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Registry identifier for log fields.
    registry_id: String,
    /// Last sampled depth.
    depth: AtomicUsize,
    /// Peak depth since last reset.
    peak_depth: AtomicUsize,
    /// Total messages processed.
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new mailbox monitor for the given registry.
    #[must_use]
    pub fn new(registry_id: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record the number of messages waiting behind the current one.
    pub fn record_depth(&self, depth: usize) {
        let previous = self.depth.swap(depth, Ordering::Relaxed);
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
        set_registry_mailbox_depth(depth);

        match Self::level_for_depth(depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "pg.actor.mailbox",
                    registry_id = %self.registry_id,
                    depth,
                    threshold = REGISTRY_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if previous <= REGISTRY_MAILBOX_NORMAL => {
                // Log once when crossing into the warning band
                debug!(
                    target: "pg.actor.mailbox",
                    registry_id = %self.registry_id,
                    depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message as fully processed.
    pub fn record_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the last sampled mailbox depth.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Get the peak mailbox depth.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Get total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Get the current mailbox level.
    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        Self::level_for_depth(self.current_depth())
    }

    /// Reset peak depth counter.
    pub fn reset_peak(&self) {
        self.peak_depth
            .store(self.current_depth(), Ordering::Relaxed);
    }

    fn level_for_depth(depth: usize) -> MailboxLevel {
        if depth > REGISTRY_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > REGISTRY_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_and_peak() {
        let monitor = MailboxMonitor::new("registry-1");
        assert_eq!(monitor.current_depth(), 0);

        monitor.record_depth(3);
        monitor.record_depth(1);
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.reset_peak();
        assert_eq!(monitor.peak_depth(), 1);
    }

    #[test]
    fn test_levels() {
        let monitor = MailboxMonitor::new("registry-1");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        monitor.record_depth(100);
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        monitor.record_depth(150);
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        monitor.record_depth(501);
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_messages_processed() {
        let monitor = MailboxMonitor::new("registry-1");
        for _ in 0..4 {
            monitor.record_processed();
        }
        assert_eq!(monitor.messages_processed(), 4);
    }
}
