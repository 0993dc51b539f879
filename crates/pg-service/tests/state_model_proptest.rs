//! Model-based checks of `RegistryState` against a plain occurrence table.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::types::GroupKey;
use pg_service::actors::RegistryState;
use pg_service::liveness::MonitorToken;
use pg_service::{mailbox, Mailbox, MemberRef};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

const GROUPS: usize = 3;
const MEMBERS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Join { group: usize, member: usize },
    Leave { group: usize, members: Vec<usize> },
    Terminate { member: usize },
    StaleNotice { member: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..GROUPS, 0..MEMBERS).prop_map(|(group, member)| Op::Join { group, member }),
        3 => (0..GROUPS, prop::collection::vec(0..MEMBERS, 0..4))
            .prop_map(|(group, members)| Op::Leave { group, members }),
        1 => (0..MEMBERS).prop_map(|member| Op::Terminate { member }),
        1 => (0..MEMBERS).prop_map(|member| Op::StaleNotice { member }),
    ]
}

struct Fixture {
    groups: Vec<GroupKey>,
    members: Vec<(MemberRef, Mailbox)>,
    /// Every token ever minted, per member
    seen_tokens: HashMap<usize, Vec<MonitorToken>>,
    /// Occurrence count per (group, member)
    model: HashMap<(usize, usize), u32>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            groups: (0..GROUPS).map(|_| GroupKey::new()).collect(),
            members: (0..MEMBERS).map(|_| mailbox()).collect(),
            seen_tokens: HashMap::new(),
            model: HashMap::new(),
        }
    }

    fn total(&self, member: usize) -> u32 {
        (0..GROUPS)
            .map(|g| self.model.get(&(g, member)).copied().unwrap_or(0))
            .sum()
    }

    fn apply(&mut self, state: &mut RegistryState, op: &Op) {
        match op {
            Op::Join { group, member } => {
                let was_absent = self.total(*member) == 0;
                let outcome = state.join(self.groups[*group], self.members[*member].0.clone());

                assert_eq!(outcome.monitor.is_some(), was_absent);
                if let Some((_, token)) = outcome.monitor {
                    self.seen_tokens.entry(*member).or_default().push(token);
                }

                let count = self.model.entry((*group, *member)).or_default();
                assert_eq!(outcome.handle.occurrence(), *count);
                *count += 1;
            }
            Op::Leave { group, members } => {
                let ids: Vec<_> = members.iter().map(|m| self.members[*m].0.id()).collect();
                let outcome = state.leave(self.groups[*group], &ids);

                let mut removed = 0;
                let mut drained = HashSet::new();
                for m in members {
                    let count = self.model.entry((*group, *m)).or_default();
                    if *count > 0 {
                        *count -= 1;
                        removed += 1;
                        if self.total(*m) == 0 {
                            drained.insert(*m);
                        }
                    }
                }

                assert_eq!(outcome.removed, removed);
                let released: HashSet<_> = outcome.released.iter().map(|t| t.member).collect();
                let expected: HashSet<_> =
                    drained.iter().map(|m| self.members[*m].0.id()).collect();
                assert_eq!(released, expected);
            }
            Op::Terminate { member } => {
                let id = self.members[*member].0.id();
                let token = state.monitor_for(id);
                assert_eq!(token.is_some(), self.total(*member) > 0);

                if let Some(token) = token {
                    let eviction = state.member_down(token).expect("current token evicts");
                    assert_eq!(eviction.occurrences, self.total(*member));
                    for g in 0..GROUPS {
                        self.model.remove(&(g, *member));
                    }
                    // A duplicate notice changes nothing
                    assert!(state.member_down(token).is_none());
                }
            }
            Op::StaleNotice { member } => {
                let id = self.members[*member].0.id();
                let current = state.monitor_for(id);
                let stale = self
                    .seen_tokens
                    .get(member)
                    .and_then(|tokens| tokens.iter().find(|t| Some(**t) != current).copied());
                if let Some(token) = stale {
                    assert!(state.member_down(token).is_none());
                }
            }
        }
    }

    fn check(&self, state: &RegistryState) {
        let mut live_groups = 0;
        for (g, key) in self.groups.iter().enumerate() {
            let handles = state.members(*key);
            let mut counts: HashMap<_, u32> = HashMap::new();
            for handle in &handles {
                assert_eq!(handle.group(), *key);
                *counts.entry(handle.member_id()).or_default() += 1;
            }
            for (m, (member, _)) in self.members.iter().enumerate() {
                let expected = self.model.get(&(g, m)).copied().unwrap_or(0);
                assert_eq!(counts.get(&member.id()).copied().unwrap_or(0), expected);
                assert_eq!(state.occurrences(*key, member.id()), expected);
            }
            if !handles.is_empty() {
                live_groups += 1;
            }
        }
        assert_eq!(state.group_count(), live_groups);

        let mut monitored = 0;
        for (m, (member, _)) in self.members.iter().enumerate() {
            let total = self.total(m);
            assert_eq!(state.total_occurrences(member.id()), total);
            assert_eq!(state.monitor_for(member.id()).is_some(), total > 0);
            if total > 0 {
                monitored += 1;
            }

            let mut expected: Vec<_> = (0..GROUPS)
                .filter(|g| self.model.get(&(*g, m)).copied().unwrap_or(0) > 0)
                .map(|g| self.groups[g])
                .collect();
            expected.sort();
            assert_eq!(state.which_groups(member.id()), expected);
        }
        assert_eq!(state.monitor_count(), monitored);
        assert_eq!(state.member_count(), monitored);
    }
}

proptest! {
    /// Any sequence of operations keeps occurrences, groups and monitors
    /// in agreement with a plain count table.
    #[test]
    fn state_matches_model(ops in prop::collection::vec(arb_op(), 1..60)) {
        let mut fixture = Fixture::new();
        let mut state = RegistryState::new();

        for op in &ops {
            fixture.apply(&mut state, op);
            fixture.check(&state);
        }
    }

    /// Members is a pure read: repeated snapshots are identical.
    #[test]
    fn members_snapshot_is_deterministic(ops in prop::collection::vec(arb_op(), 1..30)) {
        let mut fixture = Fixture::new();
        let mut state = RegistryState::new();
        for op in &ops {
            fixture.apply(&mut state, op);
        }
        for key in &fixture.groups {
            prop_assert_eq!(state.members(*key), state.members(*key));
        }
    }
}
