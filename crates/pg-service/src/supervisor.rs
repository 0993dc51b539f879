//! Supervised named registries.
//!
//! A [`RegistrySupervisor`] owns one named registry and restarts it whenever
//! it stops without the supervisor itself being shut down. Each restart
//! starts from empty state under the same name: handles to the old instance
//! fail with `RegistryUnavailable` and `whereis` yields the new one. Members
//! must re-join after a restart.
//!
//! Restart intensity is bounded by [`RestartPolicy`]: more than
//! `max_restarts` restarts within `window` and the supervisor gives up,
//! unregisters the name and stops.

use crate::actors::{RegistryHandle, RegistryOptions};
use crate::directory::RegistryDirectory;
use crate::errors::StartError;
use crate::observability::metrics;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Default maximum restarts within the window.
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

/// Default restart intensity window.
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(5);

/// Bounds on how often a registry may be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restarts allowed within `window`.
    pub max_restarts: u32,
    /// Sliding window for counting restarts.
    pub window: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            window: DEFAULT_RESTART_WINDOW,
        }
    }
}

/// Handle to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    name: String,
    directory: RegistryDirectory,
    restarts: Arc<AtomicU32>,
    cancel_token: CancellationToken,
}

impl SupervisorHandle {
    /// Name of the supervised registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The currently running registry, if any.
    #[must_use]
    pub fn current(&self) -> Option<RegistryHandle> {
        self.directory.whereis(&self.name)
    }

    /// Total restarts performed so far.
    #[must_use]
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Stop supervising and stop the current registry.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the supervisor has been shut down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Restarts a named registry with fresh state.
pub struct RegistrySupervisor {
    name: String,
    directory: RegistryDirectory,
    options: RegistryOptions,
    policy: RestartPolicy,
    restarts: Arc<AtomicU32>,
    cancel_token: CancellationToken,
}

impl RegistrySupervisor {
    /// Start the registry under `name` and supervise it.
    ///
    /// The first start happens before this returns, so a taken name is
    /// reported to the caller. Cancelling `options.parent_token` stops the
    /// supervisor and its registry.
    ///
    /// # Errors
    ///
    /// Any `StartError` from the initial start.
    pub fn start(
        directory: RegistryDirectory,
        name: impl Into<String>,
        options: RegistryOptions,
        policy: RestartPolicy,
    ) -> Result<(SupervisorHandle, JoinHandle<()>), StartError> {
        let name = name.into();
        let cancel_token = options
            .parent_token
            .as_ref()
            .map_or_else(CancellationToken::new, CancellationToken::child_token);
        let options = options.with_parent_token(cancel_token.clone());

        let (registry, registry_task) = directory.start_named(&name, options.clone())?;

        info!(
            target: "pg.supervisor",
            name = %name,
            registry_id = %registry.id(),
            max_restarts = policy.max_restarts,
            window_ms = u64::try_from(policy.window.as_millis()).unwrap_or(u64::MAX),
            "Supervisor started"
        );

        let restarts = Arc::new(AtomicU32::new(0));
        let supervisor = Self {
            name: name.clone(),
            directory: directory.clone(),
            options,
            policy,
            restarts: Arc::clone(&restarts),
            cancel_token: cancel_token.clone(),
        };

        let task = tokio::spawn(supervisor.run(registry, registry_task));

        let handle = SupervisorHandle {
            name,
            directory,
            restarts,
            cancel_token,
        };

        Ok((handle, task))
    }

    #[instrument(skip_all, name = "pg.supervisor", fields(name = %self.name))]
    async fn run(self, mut registry: RegistryHandle, mut registry_task: JoinHandle<()>) {
        let mut recent: VecDeque<Instant> = VecDeque::new();

        let cancelled = loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "pg.supervisor",
                        name = %self.name,
                        registry_id = %registry.id(),
                        "Supervisor received cancellation signal"
                    );
                    break true;
                }

                result = &mut registry_task => {
                    if self.cancel_token.is_cancelled() {
                        break false;
                    }

                    match result {
                        Err(e) if e.is_panic() => {
                            warn!(
                                target: "pg.supervisor",
                                name = %self.name,
                                registry_id = %registry.id(),
                                "Registry panicked"
                            );
                        }
                        _ => {
                            warn!(
                                target: "pg.supervisor",
                                name = %self.name,
                                registry_id = %registry.id(),
                                "Registry stopped unexpectedly"
                            );
                        }
                    }

                    let now = Instant::now();
                    while recent
                        .front()
                        .is_some_and(|t| now.duration_since(*t) > self.policy.window)
                    {
                        recent.pop_front();
                    }

                    if u32::try_from(recent.len()).unwrap_or(u32::MAX) >= self.policy.max_restarts {
                        error!(
                            target: "pg.supervisor",
                            name = %self.name,
                            restarts = recent.len(),
                            "Restart intensity exceeded, giving up"
                        );
                        break false;
                    }

                    match self.directory.start_named(&self.name, self.options.clone()) {
                        Ok((next, next_task)) => {
                            recent.push_back(now);
                            self.restarts.fetch_add(1, Ordering::SeqCst);
                            metrics::record_registry_restart();
                            info!(
                                target: "pg.supervisor",
                                name = %self.name,
                                old_registry_id = %registry.id(),
                                registry_id = %next.id(),
                                "Registry restarted with empty state"
                            );
                            registry = next;
                            registry_task = next_task;
                        }
                        Err(e) => {
                            error!(
                                target: "pg.supervisor",
                                name = %self.name,
                                error = %e,
                                "Failed to restart registry"
                            );
                            break false;
                        }
                    }
                }
            }
        };

        if cancelled {
            registry.cancel();
            let _ = registry_task.await;
        }

        // Release the name unless someone else has claimed it since
        if self
            .directory
            .whereis(&self.name)
            .map_or(true, |current| current.id() == registry.id())
        {
            self.directory.unregister(&self.name);
        }

        info!(
            target: "pg.supervisor",
            name = %self.name,
            restarts = self.restarts.load(Ordering::SeqCst),
            "Supervisor stopped"
        );
    }
}
