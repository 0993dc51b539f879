//! `RegistryState` - the registry's pure state machine.
//!
//! No I/O happens here. Each mutation returns the liveness effects the actor
//! must apply (monitors to establish or release), which keeps every invariant
//! testable without a runtime.
//!
//! # Invariants
//!
//! - The occurrence count of a member in a group equals joins minus applied
//!   leaves minus evictions, as seen in mailbox order.
//! - A member has exactly one monitor while its total occurrence count across
//!   all groups is at least one, and none otherwise.
//! - `member_groups` lists exactly the groups in which the member has an
//!   occurrence. Groups with no occurrences are dropped.
//! - Eviction removes every occurrence of the member from every group within
//!   a single message.

use crate::liveness::MonitorToken;
use crate::member::{MemberHandle, MemberRef};

use common::types::{GroupKey, MemberId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Occurrences of one member in one group.
#[derive(Debug, Clone)]
struct Occurrences {
    member: MemberRef,
    count: u32,
}

/// The liveness subscription held for one distinct member.
#[derive(Debug, Clone, Copy)]
struct MonitorEntry {
    token: MonitorToken,
    /// Total occurrences across all groups.
    occurrences: u32,
}

/// Result of a join.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Handle for the new occurrence.
    pub handle: MemberHandle,
    /// Set on the member's first occurrence: a monitor to establish.
    pub monitor: Option<(MemberRef, MonitorToken)>,
}

/// Result of a leave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Occurrences actually removed.
    pub removed: u32,
    /// Monitors to release because a member's total count reached zero.
    pub released: Vec<MonitorToken>,
}

/// Result of processing a termination notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// The evicted member.
    pub member: MemberId,
    /// The released monitor.
    pub token: MonitorToken,
    /// Groups the member was removed from.
    pub groups: usize,
    /// Occurrences removed across those groups.
    pub occurrences: u32,
}

/// Group membership owned exclusively by one registry actor.
#[derive(Debug, Default)]
pub struct RegistryState {
    groups: HashMap<GroupKey, BTreeMap<MemberId, Occurrences>>,
    member_groups: HashMap<MemberId, HashSet<GroupKey>>,
    monitors: HashMap<MemberId, MonitorEntry>,
}

impl RegistryState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `member` to `group`.
    pub fn join(&mut self, group: GroupKey, member: MemberRef) -> JoinOutcome {
        let id = member.id();

        let entry = self
            .groups
            .entry(group)
            .or_default()
            .entry(id)
            .or_insert_with(|| Occurrences {
                member: member.clone(),
                count: 0,
            });
        let occurrence = entry.count;
        entry.count += 1;

        self.member_groups.entry(id).or_default().insert(group);

        let handle = MemberHandle::new(member.clone(), group, occurrence);

        let monitor = match self.monitors.get_mut(&id) {
            Some(existing) => {
                existing.occurrences += 1;
                None
            }
            None => {
                let token = MonitorToken::next(id);
                self.monitors.insert(
                    id,
                    MonitorEntry {
                        token,
                        occurrences: 1,
                    },
                );
                Some((member, token))
            }
        };

        JoinOutcome { handle, monitor }
    }

    /// Remove one occurrence of each listed member from `group`.
    ///
    /// Members without an occurrence in `group` are skipped; a member listed
    /// twice loses two occurrences.
    pub fn leave(&mut self, group: GroupKey, members: &[MemberId]) -> LeaveOutcome {
        let mut outcome = LeaveOutcome::default();

        for id in members {
            if !self.remove_one(group, *id) {
                continue;
            }
            outcome.removed += 1;

            let drained = match self.monitors.get_mut(id) {
                Some(entry) => {
                    entry.occurrences = entry.occurrences.saturating_sub(1);
                    entry.occurrences == 0
                }
                None => false,
            };
            if drained {
                if let Some(entry) = self.monitors.remove(id) {
                    outcome.released.push(entry.token);
                }
                self.member_groups.remove(id);
            }
        }

        outcome
    }

    /// Apply a termination notice.
    ///
    /// Returns `None` if `token` is not the member's current monitor, which
    /// covers duplicate notices and notices that raced a leave-then-rejoin.
    pub fn member_down(&mut self, token: MonitorToken) -> Option<Eviction> {
        match self.monitors.get(&token.member) {
            Some(entry) if entry.token == token => {}
            _ => return None,
        }
        self.monitors.remove(&token.member);

        let groups = self.member_groups.remove(&token.member).unwrap_or_default();
        let mut occurrences = 0;
        for group in &groups {
            if let Some(members) = self.groups.get_mut(group) {
                if let Some(removed) = members.remove(&token.member) {
                    occurrences += removed.count;
                }
                if members.is_empty() {
                    self.groups.remove(group);
                }
            }
        }

        Some(Eviction {
            member: token.member,
            token,
            groups: groups.len(),
            occurrences,
        })
    }

    /// Snapshot of `group`: one handle per occurrence.
    ///
    /// Ordered by member ID, then occurrence index, so a fixed state always
    /// yields the same sequence.
    #[must_use]
    pub fn members(&self, group: GroupKey) -> Vec<MemberHandle> {
        let Some(members) = self.groups.get(&group) else {
            return Vec::new();
        };
        members
            .values()
            .flat_map(|occ| {
                (0..occ.count).map(move |i| MemberHandle::new(occ.member.clone(), group, i))
            })
            .collect()
    }

    /// Groups in which `member` has an occurrence, sorted.
    #[must_use]
    pub fn which_groups(&self, member: MemberId) -> Vec<GroupKey> {
        let mut groups: Vec<GroupKey> = self
            .member_groups
            .get(&member)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    /// Every monitor currently held, for release on shutdown.
    pub fn drain_monitors(&mut self) -> Vec<MonitorToken> {
        self.groups.clear();
        self.member_groups.clear();
        self.monitors.drain().map(|(_, entry)| entry.token).collect()
    }

    /// Occurrences of `member` in `group`.
    #[must_use]
    pub fn occurrences(&self, group: GroupKey, member: MemberId) -> u32 {
        self.groups
            .get(&group)
            .and_then(|members| members.get(&member))
            .map_or(0, |occ| occ.count)
    }

    /// Occurrences of `member` across all groups.
    #[must_use]
    pub fn total_occurrences(&self, member: MemberId) -> u32 {
        self.monitors.get(&member).map_or(0, |entry| entry.occurrences)
    }

    /// The member's current monitor, if it has one.
    #[must_use]
    pub fn monitor_for(&self, member: MemberId) -> Option<MonitorToken> {
        self.monitors.get(&member).map(|entry| entry.token)
    }

    /// Groups with at least one occurrence.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Distinct members with at least one occurrence.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.member_groups.len()
    }

    /// Monitors currently held.
    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Remove one occurrence of `id` from `group`. Returns whether one existed.
    fn remove_one(&mut self, group: GroupKey, id: MemberId) -> bool {
        let Some(members) = self.groups.get_mut(&group) else {
            return false;
        };
        let Some(occ) = members.get_mut(&id) else {
            return false;
        };

        occ.count -= 1;
        if occ.count == 0 {
            members.remove(&id);
            if let Some(groups) = self.member_groups.get_mut(&id) {
                groups.remove(&group);
            }
        }
        if members.is_empty() {
            self.groups.remove(&group);
        }
        true
    }
}
