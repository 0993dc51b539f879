//! Process-Group Registry Library
//!
//! A process-group registry: a serialized membership authority that tracks
//! which members belong to which groups and evicts members automatically
//! when they terminate.
//!
//! - Members are addressable mailboxes ([`member::mailbox`])
//! - Groups are minted locally and scoped to one registry ([`group::GroupHandle`])
//! - A member may join the same group several times; each join is one occurrence
//! - A terminated member loses every occurrence in every group in one step
//!
//! # Architecture
//!
//! ```text
//! RegistrySupervisor (optional, one per named registry)
//! └── restarts RegistryActor with empty state
//!     ├── owns RegistryState (groups, occurrences, monitors)
//!     └── LivenessOracle feeds MemberDown into the same mailbox
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer**: Every mutation and query is a message on one mailbox
//! - **Weak ordering**: Requests from different callers apply in arrival order
//! - **Stale notices ignored**: Monitor tokens distinguish a member's old
//!   subscription from its current one
//! - **No persistence**: A restarted registry is empty; members re-join
//!
//! # Modules
//!
//! - [`actors`] - Registry actor, state machine and messages
//! - [`config`] - Service configuration from environment
//! - [`directory`] - Named registries (`StartRegistry(identity)`)
//! - [`errors`] - Error types
//! - [`group`] - Group handles
//! - [`liveness`] - Termination monitoring
//! - [`member`] - Member references, mailboxes and handles
//! - [`observability`] - Metrics, health and status endpoints
//! - [`supervisor`] - Restart collaborator

pub mod actors;
pub mod config;
pub mod directory;
pub mod errors;
pub mod group;
pub mod liveness;
pub mod member;
pub mod observability;
pub mod supervisor;

pub use actors::{RegistryHandle, RegistryOptions, RegistryStatus};
pub use directory::{RegistryDirectory, RegistryIdentity};
pub use errors::{PgError, StartError};
pub use group::GroupHandle;
pub use liveness::{DownNotifier, LivenessOracle, MonitorToken, TaskLiveness};
pub use member::{mailbox, Mailbox, MemberHandle, MemberRef};
pub use supervisor::{RegistrySupervisor, RestartPolicy, SupervisorHandle};
