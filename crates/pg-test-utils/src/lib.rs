//! # PG Test Utilities
//!
//! Shared test utilities for the process-group registry.
//!
//! This crate provides a controllable liveness oracle and worker fixtures so
//! membership and eviction can be tested without real member tasks dying on
//! their own schedule.
//!
//! ## Modules
//!
//! - `mock_liveness` - Liveness oracle whose terminations are fired by the test
//! - `fixtures` - Worker members and polling helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pg_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (registry, liveness) = registry_with_mock_liveness();
//!     let group = registry.new_group();
//!     let (member, _mailbox) = pg_service::mailbox();
//!
//!     group.join(&member).await.unwrap();
//!     liveness.terminate(member.id()).await;
//!
//!     wait_for_members(&group, 0).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod mock_liveness;

pub use fixtures::*;
pub use mock_liveness::MockLiveness;
