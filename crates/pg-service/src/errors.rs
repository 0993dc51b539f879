//! Registry error types.
//!
//! Three failure classes reach callers:
//!
//! - [`StartError`]: the registry task could not be created. Fatal to the
//!   caller of `start_registry`, never retried here.
//! - [`PgError::RegistryUnavailable`]: the target registry is gone. The caller
//!   owns any retry policy.
//! - [`PgError::Timeout`]: no reply within the caller's bound. The request may
//!   still have been applied.
//!
//! Leave on a non-member and duplicate termination notices are no-ops, not errors.

use common::types::MemberId;
use std::time::Duration;
use thiserror::Error;

/// Error returned by registry calls and direct member sends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PgError {
    /// The registry's mailbox is closed or it dropped the reply.
    #[error("Registry unavailable")]
    RegistryUnavailable,

    /// No reply within the caller's bound. The operation may have happened.
    #[error("Registry call timed out after {0:?}")]
    Timeout(Duration),

    /// The member's mailbox has been dropped.
    #[error("Member unreachable: {0}")]
    MemberUnreachable(MemberId),
}

impl PgError {
    /// Returns a bounded label for the `error_type` metric dimension.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            PgError::RegistryUnavailable => "registry_unavailable",
            PgError::Timeout(_) => "timeout",
            PgError::MemberUnreachable(_) => "member_unreachable",
        }
    }

    /// Whether the caller may reasonably retry the same call.
    ///
    /// A timed-out call may have been applied, so retrying a join can add a
    /// second occurrence.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, PgError::Timeout(_))
    }
}

/// Error returned when a registry cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// Another live registry is already bound to this name.
    #[error("Name already registered: {0}")]
    NameTaken(String),

    /// Called outside a Tokio runtime, so the registry task cannot be spawned.
    #[error("No Tokio runtime available to spawn the registry")]
    NoRuntime,

    /// The supplied options cannot produce a working registry.
    #[error("Invalid registry options: {0}")]
    InvalidOptions(String),
}
