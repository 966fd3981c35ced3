//! Repository reconciliation.
//!
//! Keeps exactly one catalog watcher running per `Repository`: starts it on
//! first sight, restarts it when the spec or identity changes and stops it on
//! deletion.

use crate::backoff::FibonacciBackoff;
use crate::catalog::{new_catalog_watcher, CatalogWatcher, WatcherDeps};
use crate::error::ControllerError;
use crds::{Repository, RepositorySpec};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backoff state for a repository whose watcher failed to start
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// A started watcher and the repository state it was started for
struct RunningWatcher {
    uid: Option<String>,
    spec: RepositorySpec,
    watcher: Box<dyn CatalogWatcher>,
}

/// Reconciles `Repository` resources into running catalog watchers.
pub struct Reconciler {
    deps: WatcherDeps,
    retry_min: Duration,
    retry_max: Duration,
    /// Running watchers keyed by `{namespace}.{name}`
    watchers: Mutex<HashMap<String, RunningWatcher>>,
    /// Error count tracking per repository (namespace.name -> BackoffState)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(deps: WatcherDeps, retry_min: Duration, retry_max: Duration) -> Self {
        Self {
            deps,
            retry_min,
            retry_max,
            watchers: Mutex::new(HashMap::new()),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure a watcher matching the repository's current spec is running.
    pub async fn reconcile_repository(&self, repository: Arc<Repository>) -> Result<Action, ControllerError> {
        let key = repository.namespaced_name();

        let previous = {
            let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            match watchers.get(&key) {
                Some(running) if running.spec == repository.spec && running.uid == repository.uid() => {
                    debug!("Catalog watcher for Repository {} is up to date", key);
                    return Ok(Action::await_change());
                }
                Some(_) => watchers.remove(&key),
                None => None,
            }
        };

        if let Some(previous) = previous {
            info!("Repository {} changed, restarting catalog watcher", key);
            previous.watcher.stop().await;
        }

        let watcher = match new_catalog_watcher(repository.clone(), &self.deps) {
            Ok(watcher) => watcher,
            Err(ControllerError::UnsupportedRepositoryType(kind)) => {
                warn!("Repository {} has unsupported type {}, not watching it", key, kind);
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = watcher.start().await {
            watcher.stop().await;
            return Err(e);
        }

        self.watchers.lock().unwrap_or_else(PoisonError::into_inner).insert(
            key.clone(),
            RunningWatcher {
                uid: repository.uid(),
                spec: repository.spec.clone(),
                watcher,
            },
        );
        self.reset_backoff(&key);
        info!("Watching Repository {} ({})", key, repository.spec.url);
        Ok(Action::await_change())
    }

    /// Stop the watcher of a deleted repository.
    pub async fn cleanup_repository(&self, repository: Arc<Repository>) -> Result<Action, ControllerError> {
        let key = repository.namespaced_name();
        let running = self.watchers.lock().unwrap_or_else(PoisonError::into_inner).remove(&key);
        self.backoff_states.lock().unwrap_or_else(PoisonError::into_inner).remove(&key);

        match running {
            Some(running) => {
                info!("Repository {} deleted, stopping catalog watcher", key);
                running.watcher.stop().await;
            }
            None => debug!("Repository {} deleted with no running catalog watcher", key),
        }
        Ok(Action::await_change())
    }

    /// Next retry delay for a repository whose reconciliation failed
    pub fn error_backoff(&self, repository: &Repository) -> Duration {
        let key = repository.namespaced_name();
        let mut states = self.backoff_states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(key.clone())
            .or_insert_with(|| BackoffState::new(self.retry_min, self.retry_max));
        state.error_count += 1;
        let delay = state.backoff.next_backoff();
        warn!(
            "Repository {} failed {} time(s), retrying in {}s",
            key,
            state.error_count,
            delay.as_secs()
        );
        delay
    }

    fn reset_backoff(&self, key: &str) {
        if let Some(state) = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
        {
            state.reset();
        }
    }

    /// Stop every running watcher (shutdown)
    pub async fn stop_all(&self) {
        let running: Vec<(String, RunningWatcher)> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        info!("Stopping {} catalog watcher(s)", running.len());
        for (_, running) in running {
            running.watcher.stop().await;
        }
    }

    /// Keys of repositories with a running watcher
    #[cfg(test)]
    pub fn watched(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Failures counted since the last successful start
    #[cfg(test)]
    fn error_count(&self, key: &str) -> Option<u32> {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|state| state.error_count)
    }
}
