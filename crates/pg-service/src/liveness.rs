//! Liveness monitoring.
//!
//! The registry holds one monitor per distinct member it tracks. Monitors are
//! provided by an injected [`LivenessOracle`] so the registry logic can be
//! driven by a fake in tests. When a monitored member terminates the oracle
//! fires the monitor's [`DownNotifier`], which enqueues a `MemberDown` message
//! on the registry's own mailbox, so eviction is ordered with every other
//! call.
//!
//! [`TaskLiveness`] is the production oracle: it watches
//! [`MemberRef::closed`](crate::member::MemberRef::closed) from one Tokio task
//! per monitor.

use crate::actors::messages::RegistryMessage;
use crate::member::MemberRef;

use common::types::MemberId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Identifies one liveness subscription.
///
/// Tokens are minted from a monotonically increasing sequence, so a member
/// that leaves and rejoins gets a different token and a late notice for the
/// old one is recognisably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorToken {
    /// Monitored member.
    pub member: MemberId,
    /// Registry-local sequence number.
    pub seq: u64,
}

static MONITOR_SEQ: AtomicU64 = AtomicU64::new(1);

impl MonitorToken {
    /// Mint a token for `member`. Sequence numbers are unique process-wide,
    /// so registries sharing one oracle never collide.
    #[must_use]
    pub fn next(member: MemberId) -> Self {
        Self {
            member,
            seq: MONITOR_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Oracle that reports member termination to the registry.
///
/// Implementations must fire each notifier at most once (the type enforces
/// this by consuming it) and must stop watching after `demonitor`.
pub trait LivenessOracle: Send + Sync + fmt::Debug + 'static {
    /// Start watching `member`; fire `notifier` when it terminates.
    fn monitor(&self, member: &MemberRef, token: MonitorToken, notifier: DownNotifier);

    /// Stop watching. Unknown or already-fired tokens are ignored.
    fn demonitor(&self, token: MonitorToken);
}

/// One-shot termination callback into a registry mailbox.
///
/// Holds only a weak sender so outstanding monitors never keep a stopped
/// registry's mailbox open.
pub struct DownNotifier {
    token: MonitorToken,
    registry: mpsc::WeakSender<RegistryMessage>,
}

impl DownNotifier {
    pub(crate) fn new(token: MonitorToken, registry: mpsc::WeakSender<RegistryMessage>) -> Self {
        Self { token, registry }
    }

    /// The subscription this notifier belongs to.
    #[must_use]
    pub fn token(&self) -> MonitorToken {
        self.token
    }

    /// Report the member as terminated.
    ///
    /// Returns `false` if the registry has already stopped.
    pub async fn notify(self) -> bool {
        let Some(sender) = self.registry.upgrade() else {
            return false;
        };
        sender
            .send(RegistryMessage::MemberDown { token: self.token })
            .await
            .is_ok()
    }
}

impl fmt::Debug for DownNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownNotifier")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Production oracle: one watcher task per monitor.
#[derive(Debug, Clone, Default)]
pub struct TaskLiveness {
    watchers: Arc<Mutex<HashMap<MonitorToken, CancellationToken>>>,
}

impl TaskLiveness {
    /// Create a new oracle with no active monitors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of monitors still being watched.
    #[must_use]
    pub fn active_monitors(&self) -> usize {
        self.watchers.lock().map(|w| w.len()).unwrap_or(0)
    }
}

impl LivenessOracle for TaskLiveness {
    fn monitor(&self, member: &MemberRef, token: MonitorToken, notifier: DownNotifier) {
        let cancel = CancellationToken::new();
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.insert(token, cancel.clone());
        }

        let member = member.clone();
        let watchers = Arc::clone(&self.watchers);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    trace!(
                        target: "pg.liveness",
                        member_id = %token.member,
                        seq = token.seq,
                        "Monitor released"
                    );
                }
                () = member.closed() => {
                    debug!(
                        target: "pg.liveness",
                        member_id = %token.member,
                        seq = token.seq,
                        "Member terminated, notifying registry"
                    );
                    if let Ok(mut watchers) = watchers.lock() {
                        watchers.remove(&token);
                    }
                    notifier.notify().await;
                }
            }
        });
    }

    fn demonitor(&self, token: MonitorToken) {
        let cancel = self
            .watchers
            .lock()
            .ok()
            .and_then(|mut watchers| watchers.remove(&token));
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
    }
}
