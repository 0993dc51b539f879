//! Message types for the registry actor.
//!
//! Every caller request and every liveness notice is a [`RegistryMessage`] on
//! the same `tokio::sync::mpsc` mailbox. Request-reply uses
//! `tokio::sync::oneshot`.

use crate::liveness::MonitorToken;
use crate::member::{MemberHandle, MemberRef};

use common::types::{GroupKey, MemberId, RegistryId};
use serde::Serialize;
use tokio::sync::oneshot;

/// Messages sent to `RegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Add one occurrence of `member` to `group`.
    Join {
        group: GroupKey,
        member: MemberRef,
        /// Response channel for the new occurrence's handle.
        respond_to: oneshot::Sender<MemberHandle>,
    },

    /// Remove one occurrence per listed member from `group`.
    Leave {
        group: GroupKey,
        members: Vec<MemberId>,
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<()>,
    },

    /// Snapshot of every occurrence in `group`.
    Members {
        group: GroupKey,
        respond_to: oneshot::Sender<Vec<MemberHandle>>,
    },

    /// Groups in which `member` has at least one occurrence.
    WhichGroups {
        member: MemberId,
        respond_to: oneshot::Sender<Vec<GroupKey>>,
    },

    /// Get current registry status (for health checks).
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// A monitored member terminated. Sent by the liveness oracle.
    MemberDown { token: MonitorToken },

    /// Stop the registry after replying. Its state is discarded.
    Shutdown { respond_to: oneshot::Sender<()> },
}

impl RegistryMessage {
    /// Bounded label for latency metrics.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            RegistryMessage::Join { .. } => "join",
            RegistryMessage::Leave { .. } => "leave",
            RegistryMessage::Members { .. } => "members",
            RegistryMessage::WhichGroups { .. } => "which_groups",
            RegistryMessage::GetStatus { .. } => "status",
            RegistryMessage::MemberDown { .. } => "member_down",
            RegistryMessage::Shutdown { .. } => "shutdown",
        }
    }
}

/// Status of the `RegistryActor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    /// Registry instance ID.
    pub registry_id: RegistryId,
    /// Groups with at least one occurrence.
    pub group_count: usize,
    /// Distinct members with at least one occurrence.
    pub member_count: usize,
    /// Active liveness monitors (equals `member_count` while healthy).
    pub monitor_count: usize,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
    /// Messages processed since start.
    pub messages_processed: u64,
    /// Start timestamp (unix seconds).
    pub started_at: i64,
}
