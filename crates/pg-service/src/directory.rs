//! Registry directory.
//!
//! Maps names to running registries so a registry can be started under a
//! well-known identity and looked up later. A name is held only while its
//! registry is running: once the actor stops, the entry is treated as absent
//! and the name can be claimed again.

use crate::actors::{RegistryHandle, RegistryOptions};
use crate::errors::StartError;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::info;

/// How a new registry is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryIdentity {
    /// Reachable only through the returned handle.
    Anonymous,
    /// Registered in the directory under this name.
    Named(String),
}

impl fmt::Display for RegistryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Shared name table for registries.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct RegistryDirectory {
    entries: Arc<Mutex<HashMap<String, RegistryHandle>>>,
}

impl RegistryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registry with empty state.
    ///
    /// # Errors
    ///
    /// - `StartError::NameTaken` if a running registry already holds the name
    /// - `StartError::InvalidOptions` for an empty name or bad options
    /// - `StartError::NoRuntime` outside a Tokio runtime
    pub fn start_registry(
        &self,
        identity: RegistryIdentity,
        options: RegistryOptions,
    ) -> Result<RegistryHandle, StartError> {
        let (handle, _task) = match identity {
            RegistryIdentity::Anonymous => RegistryHandle::spawn(options)?,
            RegistryIdentity::Named(name) => self.start_named(&name, options)?,
        };
        Ok(handle)
    }

    /// Start a registry under `name` and return its task handle as well.
    pub(crate) fn start_named(
        &self,
        name: &str,
        options: RegistryOptions,
    ) -> Result<(RegistryHandle, JoinHandle<()>), StartError> {
        if name.is_empty() {
            return Err(StartError::InvalidOptions(
                "registry name must not be empty".to_string(),
            ));
        }

        let mut entries = self.lock();
        if entries.get(name).is_some_and(is_running) {
            return Err(StartError::NameTaken(name.to_string()));
        }

        let (handle, task) = RegistryHandle::spawn(options)?;
        entries.insert(name.to_string(), handle.clone());

        info!(
            target: "pg.directory",
            name,
            registry_id = %handle.id(),
            "Registry registered"
        );

        Ok((handle, task))
    }

    /// Look up the running registry registered as `name`.
    #[must_use]
    pub fn whereis(&self, name: &str) -> Option<RegistryHandle> {
        self.lock().get(name).filter(|h| is_running(h)).cloned()
    }

    /// Remove `name` from the directory without stopping its registry.
    pub fn unregister(&self, name: &str) -> Option<RegistryHandle> {
        self.lock().remove(name)
    }

    /// Names of all running registries, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, h)| is_running(h))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryHandle>> {
        // Entries are replaced whole, so a poisoned table is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_running(handle: &RegistryHandle) -> bool {
    !handle.is_closed() && !handle.is_cancelled()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn named(name: &str) -> RegistryIdentity {
        RegistryIdentity::Named(name.to_string())
    }

    #[tokio::test]
    async fn test_named_registry_is_found() {
        let directory = RegistryDirectory::new();
        let registry = directory
            .start_registry(named("pg"), RegistryOptions::default())
            .unwrap();

        let found = directory.whereis("pg").unwrap();
        assert_eq!(found.id(), registry.id());
        assert_eq!(directory.names(), vec!["pg".to_string()]);
        assert!(directory.whereis("other").is_none());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_name_taken_while_running() {
        let directory = RegistryDirectory::new();
        let first = directory
            .start_registry(named("pg"), RegistryOptions::default())
            .unwrap();

        let second = directory.start_registry(named("pg"), RegistryOptions::default());
        assert_eq!(
            second.map(|h| h.id()),
            Err(StartError::NameTaken("pg".to_string()))
        );

        // The original registry is untouched
        assert_eq!(directory.whereis("pg").unwrap().id(), first.id());
        assert!(first.members(common::types::GroupKey::new()).await.is_ok());

        first.cancel();
    }

    #[tokio::test]
    async fn test_stopped_registry_name_is_reclaimable() {
        let directory = RegistryDirectory::new();
        let first = directory
            .start_registry(named("pg"), RegistryOptions::default())
            .unwrap();
        first.shutdown().await.unwrap();

        assert!(directory.whereis("pg").is_none());
        assert!(directory.names().is_empty());

        let second = directory
            .start_registry(named("pg"), RegistryOptions::default())
            .unwrap();
        assert_ne!(second.id(), first.id());
        assert_eq!(directory.whereis("pg").unwrap().id(), second.id());

        second.cancel();
    }

    #[tokio::test]
    async fn test_anonymous_registries_are_not_registered() {
        let directory = RegistryDirectory::new();
        let a = directory
            .start_registry(RegistryIdentity::Anonymous, RegistryOptions::default())
            .unwrap();
        let b = directory
            .start_registry(RegistryIdentity::Anonymous, RegistryOptions::default())
            .unwrap();

        assert_ne!(a.id(), b.id());
        assert!(directory.names().is_empty());

        a.cancel();
        b.cancel();
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let directory = RegistryDirectory::new();
        let result = directory.start_registry(named(""), RegistryOptions::default());
        assert!(matches!(result, Err(StartError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_unregister_keeps_registry_running() {
        let directory = RegistryDirectory::new();
        let registry = directory
            .start_registry(named("pg"), RegistryOptions::default())
            .unwrap();

        let removed = directory.unregister("pg").unwrap();
        assert_eq!(removed.id(), registry.id());
        assert!(directory.whereis("pg").is_none());
        assert!(registry.status().await.is_ok());

        registry.cancel();
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let directory = RegistryDirectory::new();
        let result = directory.start_registry(named("pg"), RegistryOptions::default());
        assert_eq!(result.map(|h| h.id()), Err(StartError::NoRuntime));
        assert!(directory.names().is_empty());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(RegistryIdentity::Anonymous.to_string(), "anonymous");
        assert_eq!(named("pg").to_string(), "pg");
    }
}
