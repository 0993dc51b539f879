//! `RegistryActor` - the serialized membership authority.
//!
//! One actor owns one [`RegistryState`]. Join, leave, members and liveness
//! notices are all messages on its single mailbox and are applied strictly one
//! at a time in arrival order, so every call observes some total order of the
//! others without locks.
//!
//! # Liveness
//!
//! The actor establishes a monitor through its [`LivenessOracle`] on a
//! member's first occurrence and releases it when the member's last
//! occurrence leaves. A termination notice evicts every occurrence of the
//! member in one step. A notice that arrives after the member left and
//! rejoined carries an outdated token and is ignored, so join-then-die removes
//! the member while die-then-rejoin leaves exactly the new occurrence.
//!
//! # Caller Timeouts
//!
//! Each handle may carry a timeout covering enqueue plus reply. Timing out
//! only abandons the wait: a request already in the mailbox is still applied.

use crate::errors::{PgError, StartError};
use crate::group::GroupHandle;
use crate::liveness::{DownNotifier, LivenessOracle, MonitorToken, TaskLiveness};
use crate::member::{MemberHandle, MemberRef};
use crate::observability::metrics;

use super::messages::{RegistryMessage, RegistryStatus};
use super::metrics::MailboxMonitor;
use super::state::RegistryState;

use common::types::{GroupKey, MemberId, RegistryId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Default channel buffer size for the registry mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Default bound on a caller's wait for a reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a new registry.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Bounded mailbox capacity; callers wait for space when it is full.
    pub mailbox_capacity: usize,
    /// Caller-side timeout applied by handles. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Oracle used to watch members for termination.
    pub liveness: Arc<dyn LivenessOracle>,
    /// Parent token; cancelling it stops the registry.
    pub parent_token: Option<CancellationToken>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            liveness: Arc::new(TaskLiveness::new()),
            parent_token: None,
        }
    }
}

impl RegistryOptions {
    /// Use `liveness` instead of the task-based oracle.
    #[must_use]
    pub fn with_liveness(mut self, liveness: Arc<dyn LivenessOracle>) -> Self {
        self.liveness = liveness;
        self
    }

    /// Set the caller-side timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Stop the registry when `token` is cancelled.
    #[must_use]
    pub fn with_parent_token(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }
}

/// Handle to a `RegistryActor`.
///
/// Cheap to clone. All calls are request-reply through the actor's mailbox.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    registry_id: RegistryId,
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
    call_timeout: Option<Duration>,
}

impl RegistryHandle {
    /// Spawn a new registry with empty state.
    ///
    /// Returns a handle and the task join handle.
    ///
    /// # Errors
    ///
    /// - `StartError::NoRuntime` when called outside a Tokio runtime
    /// - `StartError::InvalidOptions` for a zero mailbox capacity
    pub fn spawn(options: RegistryOptions) -> Result<(Self, JoinHandle<()>), StartError> {
        if options.mailbox_capacity == 0 {
            return Err(StartError::InvalidOptions(
                "mailbox_capacity must be > 0".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let (sender, receiver) = mpsc::channel(options.mailbox_capacity);
        let cancel_token = options
            .parent_token
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let registry_id = RegistryId::new();

        let actor = RegistryActor {
            registry_id,
            receiver,
            self_sender: sender.downgrade(),
            cancel_token: cancel_token.clone(),
            state: RegistryState::new(),
            liveness: options.liveness,
            mailbox: MailboxMonitor::new(registry_id.to_string()),
            started_at: chrono::Utc::now().timestamp(),
        };

        let task_handle = runtime.spawn(actor.run());

        let handle = Self {
            registry_id,
            sender,
            cancel_token,
            call_timeout: options.call_timeout,
        };

        Ok((handle, task_handle))
    }

    /// Get the registry instance ID.
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.registry_id
    }

    /// Copy of this handle whose calls give up after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            call_timeout: Some(timeout),
            ..self.clone()
        }
    }

    /// Copy of this handle whose calls wait indefinitely.
    #[must_use]
    pub fn without_timeout(&self) -> Self {
        Self {
            call_timeout: None,
            ..self.clone()
        }
    }

    /// Mint a new group in this registry.
    ///
    /// No message is sent: the registry learns the key when it is first used.
    #[must_use]
    pub fn new_group(&self) -> GroupHandle {
        GroupHandle::new(GroupKey::new(), self.clone())
    }

    /// Add one occurrence of `member` to `group`.
    ///
    /// Monitors the member if this is its first occurrence in the registry.
    /// Keys only reach the registry through the [`GroupHandle`] that minted
    /// them, so a key from another registry never lands here.
    pub(crate) async fn join(
        &self,
        group: GroupKey,
        member: &MemberRef,
    ) -> Result<MemberHandle, PgError> {
        let member = member.clone();
        self.call("join", |respond_to| RegistryMessage::Join {
            group,
            member,
            respond_to,
        })
        .await
    }

    /// Remove one occurrence of each listed member from `group`.
    ///
    /// Members with no occurrence in `group` are ignored.
    pub(crate) async fn leave(&self, group: GroupKey, members: &[MemberId]) -> Result<(), PgError> {
        let members = members.to_vec();
        self.call("leave", |respond_to| RegistryMessage::Leave {
            group,
            members,
            respond_to,
        })
        .await
    }

    /// Snapshot of `group`, one handle per occurrence.
    pub(crate) async fn members(&self, group: GroupKey) -> Result<Vec<MemberHandle>, PgError> {
        self.call("members", |respond_to| RegistryMessage::Members {
            group,
            respond_to,
        })
        .await
    }

    /// Groups in which `member` currently has an occurrence.
    pub async fn which_groups(&self, member: MemberId) -> Result<Vec<GroupKey>, PgError> {
        self.call("which_groups", |respond_to| RegistryMessage::WhichGroups {
            member,
            respond_to,
        })
        .await
    }

    /// Get the current registry status.
    pub async fn status(&self) -> Result<RegistryStatus, PgError> {
        self.call("status", |respond_to| RegistryMessage::GetStatus { respond_to })
            .await
    }

    /// Stop the registry after it has processed everything queued ahead of
    /// this request. All group state is discarded.
    pub async fn shutdown(&self) -> Result<(), PgError> {
        self.call("shutdown", |respond_to| RegistryMessage::Shutdown { respond_to })
            .await
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Whether the actor has stopped receiving messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a request and wait for the reply, bounded by the call timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage,
    ) -> Result<T, PgError> {
        let started = Instant::now();
        let (tx, rx) = oneshot::channel();
        let exchange = async {
            self.sender
                .send(request(tx))
                .await
                .map_err(|_| PgError::RegistryUnavailable)?;
            rx.await.map_err(|_| PgError::RegistryUnavailable)
        };

        let result = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(PgError::Timeout(limit))),
            None => exchange.await,
        };

        match &result {
            Ok(_) => metrics::record_call_latency(operation, started.elapsed()),
            Err(e) => {
                debug!(
                    target: "pg.actor.registry",
                    registry_id = %self.registry_id,
                    operation,
                    error = %e,
                    "Registry call failed"
                );
                metrics::record_error(operation, e.error_type());
            }
        }

        result
    }
}

/// The `RegistryActor` implementation.
///
/// This struct owns the registry state and runs the message loop.
pub struct RegistryActor {
    /// Registry instance ID.
    registry_id: RegistryId,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Weak sender handed to liveness notifiers.
    self_sender: mpsc::WeakSender<RegistryMessage>,
    /// Cancellation token.
    cancel_token: CancellationToken,
    /// Membership state.
    state: RegistryState,
    /// Liveness oracle.
    liveness: Arc<dyn LivenessOracle>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
    /// Start timestamp.
    started_at: i64,
}

impl RegistryActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "pg.actor.registry", fields(registry_id = %self.registry_id))]
    async fn run(mut self) {
        info!(
            target: "pg.actor.registry",
            registry_id = %self.registry_id,
            "RegistryActor started"
        );

        loop {
            tokio::select! {
                // Handle cancellation
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "pg.actor.registry",
                        registry_id = %self.registry_id,
                        "RegistryActor received cancellation signal"
                    );
                    break;
                }

                // Handle messages
                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_depth(self.receiver.len());
                            let should_exit = self.handle_message(message);
                            self.mailbox.record_processed();

                            if should_exit {
                                break;
                            }
                        }
                        None => {
                            // Every handle dropped
                            info!(
                                target: "pg.actor.registry",
                                registry_id = %self.registry_id,
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.release_all();

        info!(
            target: "pg.actor.registry",
            registry_id = %self.registry_id,
            messages_processed = self.mailbox.messages_processed(),
            "RegistryActor stopped"
        );
    }

    /// Handle a single message. Returns true when the actor should stop.
    fn handle_message(&mut self, message: RegistryMessage) -> bool {
        trace!(
            target: "pg.actor.registry",
            registry_id = %self.registry_id,
            operation = message.operation(),
            "Processing message"
        );

        match message {
            RegistryMessage::Join {
                group,
                member,
                respond_to,
            } => {
                let handle = self.handle_join(group, member);
                let _ = respond_to.send(handle);
            }

            RegistryMessage::Leave {
                group,
                members,
                respond_to,
            } => {
                self.handle_leave(group, &members);
                let _ = respond_to.send(());
            }

            RegistryMessage::Members { group, respond_to } => {
                let _ = respond_to.send(self.state.members(group));
            }

            RegistryMessage::WhichGroups { member, respond_to } => {
                let _ = respond_to.send(self.state.which_groups(member));
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::MemberDown { token } => {
                self.handle_member_down(token);
            }

            RegistryMessage::Shutdown { respond_to } => {
                info!(
                    target: "pg.actor.registry",
                    registry_id = %self.registry_id,
                    group_count = self.state.group_count(),
                    "Shutdown requested"
                );
                // Cancel before replying so the caller never sees a live handle
                self.cancel_token.cancel();
                let _ = respond_to.send(());
                return true;
            }
        }

        false
    }

    fn handle_join(&mut self, group: GroupKey, member: MemberRef) -> MemberHandle {
        let outcome = self.state.join(group, member);

        if let Some((member, token)) = outcome.monitor {
            debug!(
                target: "pg.actor.registry",
                registry_id = %self.registry_id,
                member_id = %token.member,
                seq = token.seq,
                "Monitoring member"
            );
            let notifier = DownNotifier::new(token, self.self_sender.clone());
            self.liveness.monitor(&member, token, notifier);
        }

        debug!(
            target: "pg.actor.registry",
            registry_id = %self.registry_id,
            group = %group,
            member_id = %outcome.handle.member_id(),
            occurrence = outcome.handle.occurrence(),
            "Member joined"
        );

        metrics::record_join();
        self.publish_gauges();
        outcome.handle
    }

    fn handle_leave(&mut self, group: GroupKey, members: &[MemberId]) {
        let outcome = self.state.leave(group, members);

        for token in outcome.released {
            debug!(
                target: "pg.actor.registry",
                registry_id = %self.registry_id,
                member_id = %token.member,
                seq = token.seq,
                "Releasing monitor"
            );
            self.liveness.demonitor(token);
        }

        debug!(
            target: "pg.actor.registry",
            registry_id = %self.registry_id,
            group = %group,
            requested = members.len(),
            removed = outcome.removed,
            "Leave processed"
        );

        metrics::record_leaves(u64::from(outcome.removed));
        self.publish_gauges();
    }

    fn handle_member_down(&mut self, token: MonitorToken) {
        match self.state.member_down(token) {
            Some(eviction) => {
                self.liveness.demonitor(eviction.token);
                info!(
                    target: "pg.actor.registry",
                    registry_id = %self.registry_id,
                    member_id = %eviction.member,
                    groups = eviction.groups,
                    occurrences = eviction.occurrences,
                    "Evicted terminated member"
                );
                metrics::record_eviction();
                self.publish_gauges();
            }
            None => {
                debug!(
                    target: "pg.actor.registry",
                    registry_id = %self.registry_id,
                    member_id = %token.member,
                    seq = token.seq,
                    "Ignoring stale termination notice"
                );
                metrics::record_stale_down_notice();
            }
        }
    }

    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            registry_id: self.registry_id,
            group_count: self.state.group_count(),
            member_count: self.state.member_count(),
            monitor_count: self.state.monitor_count(),
            mailbox_depth: self.mailbox.current_depth(),
            messages_processed: self.mailbox.messages_processed(),
            started_at: self.started_at,
        }
    }

    fn publish_gauges(&self) {
        metrics::set_groups_active(self.state.group_count());
        metrics::set_members_monitored(self.state.monitor_count());
    }

    /// Release every monitor. Group state dies with the actor.
    fn release_all(&mut self) {
        let tokens = self.state.drain_monitors();
        if !tokens.is_empty() {
            warn!(
                target: "pg.actor.registry",
                registry_id = %self.registry_id,
                monitors = tokens.len(),
                "Discarding group state on stop"
            );
        }
        for token in tokens {
            self.liveness.demonitor(token);
        }
        self.publish_gauges();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::member::mailbox;
    use bytes::Bytes;

    fn spawn_registry() -> RegistryHandle {
        let (handle, _task) = RegistryHandle::spawn(RegistryOptions::default()).unwrap();
        handle
    }

    async fn wait_until_absent(registry: &RegistryHandle, group: GroupKey, member: MemberId) {
        let mut present = true;
        for _ in 0..100 {
            let members = registry.members(group).await.unwrap();
            present = members.iter().any(|h| h.member_id() == member);
            if !present {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!present, "member {member} was never evicted");
    }

    #[tokio::test]
    async fn test_registry_handle_join_and_members() {
        let registry = spawn_registry();
        let group = GroupKey::new();
        let (member, mut mbox) = mailbox();

        assert!(registry.members(group).await.unwrap().is_empty());

        let handle = registry.join(group, &member).await.unwrap();
        assert_eq!(registry.members(group).await.unwrap(), vec![handle.clone()]);

        handle.send("hi").unwrap();
        assert_eq!(mbox.recv().await.unwrap(), Bytes::from_static(b"hi"));

        registry.cancel();
    }

    #[tokio::test]
    async fn test_registry_handle_multiplicity() {
        let registry = spawn_registry();
        let group = GroupKey::new();
        let (member, _mbox) = mailbox();

        registry.join(group, &member).await.unwrap();
        registry.join(group, &member).await.unwrap();
        assert_eq!(registry.members(group).await.unwrap().len(), 2);

        registry.leave(group, &[member.id()]).await.unwrap();
        assert_eq!(registry.members(group).await.unwrap().len(), 1);

        registry.leave(group, &[member.id()]).await.unwrap();
        assert!(registry.members(group).await.unwrap().is_empty());

        let status = registry.status().await.unwrap();
        assert_eq!(status.monitor_count, 0);
        assert_eq!(status.group_count, 0);

        registry.cancel();
    }

    #[tokio::test]
    async fn test_registry_evicts_terminated_member() {
        let registry = spawn_registry();
        let g1 = GroupKey::new();
        let g2 = GroupKey::new();
        let (worker, worker_mbox) = mailbox();
        let (survivor, _survivor_mbox) = mailbox();

        registry.join(g1, &worker).await.unwrap();
        registry.join(g2, &worker).await.unwrap();
        registry.join(g1, &survivor).await.unwrap();

        drop(worker_mbox);

        wait_until_absent(&registry, g1, worker.id()).await;
        wait_until_absent(&registry, g2, worker.id()).await;
        let remaining = registry.members(g1).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].member_id(), survivor.id());
        assert!(registry.which_groups(worker.id()).await.unwrap().is_empty());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_registry_which_groups() {
        let registry = spawn_registry();
        let g1 = GroupKey::new();
        let g2 = GroupKey::new();
        let (member, _mbox) = mailbox();

        registry.join(g1, &member).await.unwrap();
        registry.join(g2, &member).await.unwrap();

        let mut expected = vec![g1, g2];
        expected.sort();
        assert_eq!(registry.which_groups(member.id()).await.unwrap(), expected);

        registry.cancel();
    }

    #[tokio::test]
    async fn test_calls_after_cancel_fail_unavailable() {
        let (registry, task) = RegistryHandle::spawn(RegistryOptions::default()).unwrap();
        registry.cancel();
        task.await.unwrap();

        assert!(registry.is_closed());
        assert_eq!(
            registry.members(GroupKey::new()).await,
            Err(PgError::RegistryUnavailable)
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let (registry, task) = RegistryHandle::spawn(RegistryOptions::default()).unwrap();
        let (member, _mbox) = mailbox();
        registry.join(GroupKey::new(), &member).await.unwrap();

        registry.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(registry.is_cancelled());
        assert_eq!(
            registry.join(GroupKey::new(), &member).await,
            Err(PgError::RegistryUnavailable)
        );
    }

    #[tokio::test]
    async fn test_actor_exits_when_all_handles_dropped() {
        let (registry, task) = RegistryHandle::spawn(RegistryOptions::default()).unwrap();
        let (member, _mbox) = mailbox();
        registry.join(GroupKey::new(), &member).await.unwrap();

        drop(registry);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("actor should exit once every handle is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_parent_token_cancels_registry() {
        let parent = CancellationToken::new();
        let options = RegistryOptions::default().with_parent_token(parent.clone());
        let (registry, task) = RegistryHandle::spawn(options).unwrap();

        parent.cancel();
        task.await.unwrap();
        assert!(registry.is_cancelled());
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let options = RegistryOptions {
            mailbox_capacity: 0,
            ..RegistryOptions::default()
        };
        assert!(matches!(
            RegistryHandle::spawn(options),
            Err(StartError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        assert_eq!(
            RegistryHandle::spawn(RegistryOptions::default()).map(|_| ()),
            Err(StartError::NoRuntime)
        );
    }

    #[tokio::test]
    async fn test_status_counts() {
        let registry = spawn_registry();
        let (a, _ma) = mailbox();
        let (b, _mb) = mailbox();
        let g = GroupKey::new();

        registry.join(g, &a).await.unwrap();
        registry.join(g, &a).await.unwrap();
        registry.join(GroupKey::new(), &b).await.unwrap();

        let status = registry.status().await.unwrap();
        assert_eq!(status.registry_id, registry.id());
        assert_eq!(status.group_count, 2);
        assert_eq!(status.member_count, 2);
        assert_eq!(status.monitor_count, 2);
        assert!(status.messages_processed >= 3);

        registry.cancel();
    }
}
