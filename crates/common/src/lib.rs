//! Common types shared across the process-group registry crates.

#![warn(clippy::pedantic)]

/// Module for identity types (groups, members, registries)
pub mod types;

/// Module for common configuration
pub mod config;
