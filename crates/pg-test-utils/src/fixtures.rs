//! Test fixtures for registry tests.
//!
//! - [`registry_with_mock_liveness`] - Registry wired to a [`MockLiveness`]
//! - [`TestWorker`] - A member backed by a real task that can be stopped
//! - [`wait_for_members`] - Poll a group until it reaches a size

use crate::mock_liveness::MockLiveness;

use bytes::Bytes;
use pg_service::actors::{RegistryHandle, RegistryOptions};
use pg_service::group::GroupHandle;
use pg_service::member::{mailbox, MemberHandle, MemberRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Poll interval used by the waiting helpers.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long the waiting helpers poll before giving up.
pub const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Spawn a registry whose liveness is controlled by the test.
pub fn registry_with_mock_liveness() -> (RegistryHandle, MockLiveness) {
    let liveness = MockLiveness::new();
    let options = RegistryOptions::default().with_liveness(Arc::new(liveness.clone()));
    let (registry, _task) = RegistryHandle::spawn(options).unwrap();
    (registry, liveness)
}

/// A member whose mailbox lives in its own task.
///
/// The task collects everything delivered to it until stopped. Stopping the
/// task drops the mailbox, which is what the registry observes as
/// termination.
pub struct TestWorker {
    member: MemberRef,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Vec<Bytes>>,
}

impl TestWorker {
    /// Spawn a worker on the current runtime.
    pub fn spawn() -> Self {
        let (member, mut mbox) = mailbox();
        let (stop, mut stopped) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut received = Vec::new();
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    msg = mbox.recv() => match msg {
                        Some(payload) => received.push(payload),
                        None => break,
                    },
                }
            }
            received
        });
        Self { member, stop, task }
    }

    /// The worker's address.
    pub fn member(&self) -> &MemberRef {
        &self.member
    }

    /// Terminate the worker and return what it received.
    pub async fn stop(self) -> Vec<Bytes> {
        let _ = self.stop.send(());
        self.task.await.unwrap()
    }
}

/// Wait until `group` has exactly `expected` occurrences.
///
/// # Errors
///
/// Fails if the registry call fails or the size is not reached in time.
pub async fn wait_for_members(
    group: &GroupHandle,
    expected: usize,
) -> anyhow::Result<Vec<MemberHandle>> {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        let members = group.members().await?;
        if members.len() == expected {
            return Ok(members);
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "group {} has {} occurrences, expected {expected}",
                group.key(),
                members.len()
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
