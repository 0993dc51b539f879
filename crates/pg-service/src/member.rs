//! Member addressing.
//!
//! A member is any task that owns a [`Mailbox`]. Its [`MemberRef`] is the
//! cloneable address other tasks use to reach it directly; the registry only
//! stores and hands out these addresses, it never relays payloads.
//!
//! A member terminates, as far as the registry is concerned, when its
//! `Mailbox` is dropped. That is what [`MemberRef::closed`] waits for and what
//! the default liveness oracle watches.

use crate::errors::PgError;

use bytes::Bytes;
use common::types::{GroupKey, MemberId};
use std::fmt;
use std::hash::{Hash, Hasher};
use tokio::sync::mpsc;

/// Create a fresh member identity with its mailbox.
#[must_use]
pub fn mailbox() -> (MemberRef, Mailbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let id = MemberId::new();
    (MemberRef { id, sender }, Mailbox { id, receiver })
}

/// Address of a member. Equality and hashing use the member ID only.
#[derive(Clone)]
pub struct MemberRef {
    id: MemberId,
    sender: mpsc::UnboundedSender<Bytes>,
}

impl MemberRef {
    /// Get the member ID.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Deliver a payload straight to the member's mailbox.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<(), PgError> {
        self.sender
            .send(payload.into())
            .map_err(|_| PgError::MemberUnreachable(self.id))
    }

    /// Whether the member's mailbox has been dropped.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once the member's mailbox has been dropped.
    pub async fn closed(&self) {
        self.sender.closed().await;
    }
}

impl PartialEq for MemberRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MemberRef {}

impl Hash for MemberRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberRef")
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Receiving side of a member. Dropping it terminates the member.
#[derive(Debug)]
pub struct Mailbox {
    id: MemberId,
    receiver: mpsc::UnboundedReceiver<Bytes>,
}

impl Mailbox {
    /// Get the member ID this mailbox belongs to.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Receive the next payload. Returns `None` once every address is dropped.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Receive a payload if one is already queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.receiver.try_recv().ok()
    }
}

/// One occurrence of a member in a group, as returned by join and members.
///
/// Handles are derived, not stored: `(member, group, occurrence)` where
/// `occurrence` is the zero-based index of this occurrence among the member's
/// occurrences in the group. A member joined twice yields two distinct handles.
#[derive(Clone, Debug)]
pub struct MemberHandle {
    member: MemberRef,
    group: GroupKey,
    occurrence: u32,
}

impl MemberHandle {
    pub(crate) fn new(member: MemberRef, group: GroupKey, occurrence: u32) -> Self {
        Self {
            member,
            group,
            occurrence,
        }
    }

    /// Get the member ID.
    #[must_use]
    pub fn member_id(&self) -> MemberId {
        self.member.id()
    }

    /// Get the member's address.
    #[must_use]
    pub fn member(&self) -> &MemberRef {
        &self.member
    }

    /// Get the group this occurrence belongs to.
    #[must_use]
    pub fn group(&self) -> GroupKey {
        self.group
    }

    /// Get the occurrence index within the group.
    #[must_use]
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }

    /// Send a payload directly to the member, bypassing the registry.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<(), PgError> {
        self.member.send(payload)
    }
}

impl PartialEq for MemberHandle {
    fn eq(&self, other: &Self) -> bool {
        self.member.id() == other.member.id()
            && self.group == other.group
            && self.occurrence == other.occurrence
    }
}

impl Eq for MemberHandle {}

impl Hash for MemberHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.member.id().hash(state);
        self.group.hash(state);
        self.occurrence.hash(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_mailbox() {
        let (member, mut mailbox) = mailbox();
        assert_eq!(member.id(), mailbox.id());

        member.send("hi").unwrap();
        assert_eq!(mailbox.recv().await.unwrap(), Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn test_send_after_mailbox_dropped_fails() {
        let (member, mailbox) = mailbox();
        drop(mailbox);

        assert!(member.is_terminated());
        assert_eq!(
            member.send("late"),
            Err(PgError::MemberUnreachable(member.id()))
        );
    }

    #[tokio::test]
    async fn test_closed_resolves_on_drop() {
        let (member, mailbox) = mailbox();
        let watcher = member.clone();
        let task = tokio::spawn(async move { watcher.closed().await });

        assert!(!member.is_terminated());
        drop(mailbox);

        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("closed() should resolve after the mailbox drops")
            .unwrap();
    }

    #[test]
    fn test_member_ref_equality_uses_id() {
        let (a, _mailbox_a) = mailbox();
        let (b, _mailbox_b) = mailbox();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_handles_distinct_per_occurrence() {
        let (member, mut mailbox) = mailbox();
        let group = GroupKey::new();

        let first = MemberHandle::new(member.clone(), group, 0);
        let second = MemberHandle::new(member.clone(), group, 1);
        assert_ne!(first, second);
        assert_eq!(first, MemberHandle::new(member.clone(), group, 0));
        assert_ne!(first, MemberHandle::new(member, GroupKey::new(), 0));

        second.send("via handle").unwrap();
        assert_eq!(mailbox.try_recv().unwrap(), Bytes::from_static(b"via handle"));
        assert!(mailbox.try_recv().is_none());
    }
}
