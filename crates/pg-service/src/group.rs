//! Group handles.
//!
//! A [`GroupHandle`] pairs a freshly minted [`GroupKey`] with the registry
//! that scopes it. Minting is local and free; the registry only starts
//! tracking the key when a member first joins. A group whose last occurrence
//! leaves costs the registry nothing, and a handle whose registry has stopped
//! fails every call with `RegistryUnavailable` rather than recreating state
//! elsewhere.

use crate::actors::RegistryHandle;
use crate::errors::PgError;
use crate::member::{MemberHandle, MemberRef};

use common::types::{GroupKey, MemberId};
use std::fmt;
use std::time::Duration;

/// A group scoped to one registry.
#[derive(Clone)]
pub struct GroupHandle {
    key: GroupKey,
    registry: RegistryHandle,
}

impl GroupHandle {
    pub(crate) fn new(key: GroupKey, registry: RegistryHandle) -> Self {
        Self { key, registry }
    }

    /// Get the group key.
    #[must_use]
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Get the owning registry.
    #[must_use]
    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Copy of this handle whose calls give up after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::new(self.key, self.registry.with_timeout(timeout))
    }

    /// Copy of this handle whose calls wait indefinitely.
    #[must_use]
    pub fn without_timeout(&self) -> Self {
        Self::new(self.key, self.registry.without_timeout())
    }

    /// Add one occurrence of `member`.
    pub async fn join(&self, member: &MemberRef) -> Result<MemberHandle, PgError> {
        self.registry.join(self.key, member).await
    }

    /// Remove one occurrence of each listed member.
    pub async fn leave(&self, members: &[MemberId]) -> Result<(), PgError> {
        self.registry.leave(self.key, members).await
    }

    /// Snapshot of the group's occurrences.
    pub async fn members(&self) -> Result<Vec<MemberHandle>, PgError> {
        self.registry.members(self.key).await
    }
}

impl PartialEq for GroupHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.registry.id() == other.registry.id()
    }
}

impl Eq for GroupHandle {}

impl fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupHandle")
            .field("key", &self.key)
            .field("registry_id", &self.registry.id())
            .finish()
    }
}
