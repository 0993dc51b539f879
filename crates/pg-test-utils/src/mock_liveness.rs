//! Liveness oracle driven by the test.
//!
//! `MockLiveness` records every monitor the registry establishes and fires a
//! termination notice only when the test asks for one. Released monitors keep
//! their notifier so a test can deliver a late notice for a subscription the
//! registry already dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use pg_test_utils::MockLiveness;
//!
//! let liveness = MockLiveness::new();
//! let options = RegistryOptions::default().with_liveness(Arc::new(liveness.clone()));
//!
//! // ... join a member ...
//! assert!(liveness.is_monitored(member.id()));
//! assert!(liveness.terminate(member.id()).await);
//! ```

use common::types::MemberId;
use pg_service::liveness::{DownNotifier, LivenessOracle, MonitorToken};
use pg_service::member::MemberRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock liveness oracle for testing eviction ordering.
#[derive(Debug, Clone, Default)]
pub struct MockLiveness {
    inner: Arc<Mutex<MockLivenessInner>>,
}

#[derive(Debug, Default)]
struct MockLivenessInner {
    /// Active monitor per member
    active: HashMap<MemberId, (MonitorToken, DownNotifier)>,
    /// Notifiers of monitors the registry released
    released: HashMap<MonitorToken, DownNotifier>,
    /// Every monitor call, in order
    monitor_calls: Vec<MonitorToken>,
    /// Every demonitor call, in order
    demonitor_calls: Vec<MonitorToken>,
}

impl MockLiveness {
    /// Create a new mock with no monitors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `member` as terminated through its active monitor.
    ///
    /// Returns `false` if the member is not monitored or the registry has
    /// stopped.
    pub async fn terminate(&self, member: MemberId) -> bool {
        let notifier = {
            let mut inner = self.inner.lock().unwrap();
            inner.active.remove(&member).map(|(_, notifier)| notifier)
        };
        match notifier {
            Some(notifier) => notifier.notify().await,
            None => false,
        }
    }

    /// Deliver a notice for a monitor the registry already released.
    ///
    /// Models a termination notice that was in flight when the member left.
    pub async fn deliver_released(&self, token: MonitorToken) -> bool {
        let notifier = self.inner.lock().unwrap().released.remove(&token);
        match notifier {
            Some(notifier) => notifier.notify().await,
            None => false,
        }
    }

    /// Whether `member` currently holds a monitor.
    pub fn is_monitored(&self, member: MemberId) -> bool {
        self.inner.lock().unwrap().active.contains_key(&member)
    }

    /// Token of the active monitor on `member`.
    pub fn active_token(&self, member: MemberId) -> Option<MonitorToken> {
        self.inner
            .lock()
            .unwrap()
            .active
            .get(&member)
            .map(|(token, _)| *token)
    }

    /// Number of active monitors.
    pub fn active_monitors(&self) -> usize {
        self.inner.lock().unwrap().active.len()
    }

    /// Every monitor established so far.
    pub fn monitor_calls(&self) -> Vec<MonitorToken> {
        self.inner.lock().unwrap().monitor_calls.clone()
    }

    /// Every monitor released so far.
    pub fn demonitor_calls(&self) -> Vec<MonitorToken> {
        self.inner.lock().unwrap().demonitor_calls.clone()
    }
}

impl LivenessOracle for MockLiveness {
    fn monitor(&self, member: &MemberRef, token: MonitorToken, notifier: DownNotifier) {
        let mut inner = self.inner.lock().unwrap();
        inner.monitor_calls.push(token);
        inner.active.insert(member.id(), (token, notifier));
    }

    fn demonitor(&self, token: MonitorToken) {
        let mut inner = self.inner.lock().unwrap();
        inner.demonitor_calls.push(token);
        if inner
            .active
            .get(&token.member)
            .is_some_and(|(active, _)| *active == token)
        {
            if let Some((_, notifier)) = inner.active.remove(&token.member) {
                inner.released.insert(token, notifier);
            }
        }
    }
}
