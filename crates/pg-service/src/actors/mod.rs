//! Actor implementation for the process-group registry.
//!
//! ```text
//! RegistryActor (one per registry)
//! ├── owns RegistryState (groups, occurrences, monitors)
//! └── receives MemberDown notices from its LivenessOracle
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single mailbox**: Join, leave, members and termination notices share one queue
//! - **Pure state**: `RegistryState` holds every membership rule and has no I/O
//! - **Weak self-reference**: Liveness notifiers never keep a registry alive
//! - **CancellationToken propagation**: A parent token stops every child registry
//!
//! # Modules
//!
//! - [`registry`] - `RegistryActor` and its `RegistryHandle`
//! - [`state`] - Membership state machine
//! - [`messages`] - Message types for the registry mailbox
//! - [`metrics`] - Mailbox monitoring

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod state;

// Re-export primary types
pub use messages::*;
pub use metrics::{MailboxLevel, MailboxMonitor};
pub use registry::{
    RegistryActor, RegistryHandle, RegistryOptions, DEFAULT_CALL_TIMEOUT,
    DEFAULT_MAILBOX_CAPACITY,
};
pub use state::{Eviction, JoinOutcome, LeaveOutcome, RegistryState};
