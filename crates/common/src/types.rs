//! Identity types for the process-group registry.
//!
//! All identities are random UUID v4 values. They are compared by value, never
//! reused, and carry no ownership of registry resources: minting one is free
//! and dropping one releases nothing.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque key naming one group inside one registry.
///
/// Two keys are equal only if they were produced by the same call to
/// [`GroupKey::new`]. The inner value is private and keys are neither
/// serialized nor parsed, so a key cannot be rebuilt from its text:
///
/// ```compile_fail
/// let forged = common::types::GroupKey(uuid::Uuid::nil());
/// ```
///
/// ```compile_fail
/// let parsed: common::types::GroupKey =
///     serde_json::from_str("\"00000000-0000-0000-0000-000000000000\"").unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Uuid);

impl GroupKey {
    /// Mint a fresh group key
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Identity of an addressable member (one worker task)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    /// Create a new random member ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Unique identifier for a running registry instance
///
/// A restarted registry gets a new ID even when it is bound to the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub Uuid);

impl RegistryId {
    /// Create a new random registry ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry-{}", self.0)
    }
}
