//! Mock ChartClient for unit testing
//!
//! Stores catalogs in memory, records every call, and can be told to fail the
//! next N calls of an operation so watcher error paths can be exercised
//! without a registry.

use crate::chart_trait::ChartClientTrait;
use crate::error::ChartError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    registered: HashMap<String, RepositoryEntry>,
    catalogs: HashMap<String, Catalog>,
    unregistered: Vec<String>,
    register_timeouts: Vec<Duration>,
    refresh_timeouts: Vec<Duration>,
    fail_register: bool,
    failing_refreshes: u32,
    failing_fetches: u32,
    refresh_calls: usize,
    fetch_calls: usize,
}

/// Mock chart client for testing
#[derive(Clone, Default)]
pub struct MockChartClient {
    state: Arc<Mutex<MockState>>,
}

impl MockChartClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `catalog` for the repository registered as `name` (for test setup)
    pub fn set_catalog(&self, name: &str, catalog: Catalog) {
        self.state.lock().unwrap().catalogs.insert(name.to_string(), catalog);
    }

    /// Make every `register` call fail
    pub fn fail_register(&self, fail: bool) {
        self.state.lock().unwrap().fail_register = fail;
    }

    /// Fail the next `n` refresh calls
    pub fn fail_next_refreshes(&self, n: u32) {
        self.state.lock().unwrap().failing_refreshes = n;
    }

    /// Fail the next `n` fetch_catalog calls
    pub fn fail_next_fetches(&self, n: u32) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.lock().unwrap().registered.contains_key(name)
    }

    pub fn unregistered(&self) -> Vec<String> {
        self.state.lock().unwrap().unregistered.clone()
    }

    pub fn register_timeouts(&self) -> Vec<Duration> {
        self.state.lock().unwrap().register_timeouts.clone()
    }

    pub fn refresh_timeouts(&self) -> Vec<Duration> {
        self.state.lock().unwrap().refresh_timeouts.clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }
}

#[async_trait::async_trait]
impl ChartClientTrait for MockChartClient {
    async fn register(&self, entry: RepositoryEntry, timeout: Duration) -> Result<(), ChartError> {
        let mut state = self.state.lock().unwrap();
        state.register_timeouts.push(timeout);
        if state.fail_register {
            return Err(ChartError::Registry(format!("mock registry for {} unreachable", entry.url)));
        }
        state.registered.insert(entry.name.clone(), entry);
        Ok(())
    }

    async fn refresh(&self, name: &str, timeout: Duration) -> Result<(), ChartError> {
        let mut state = self.state.lock().unwrap();
        state.refresh_calls += 1;
        state.refresh_timeouts.push(timeout);
        if !state.registered.contains_key(name) {
            return Err(ChartError::NotRegistered(name.to_string()));
        }
        if state.failing_refreshes > 0 {
            state.failing_refreshes -= 1;
            return Err(ChartError::Timeout(timeout));
        }
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), ChartError> {
        let mut state = self.state.lock().unwrap();
        state.unregistered.push(name.to_string());
        state
            .registered
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ChartError::NotRegistered(name.to_string()))
    }

    async fn fetch_catalog(&self, name: &str) -> Result<Catalog, ChartError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(ChartError::Registry(format!("mock fetch of {} failed", name)));
        }
        state
            .catalogs
            .get(name)
            .cloned()
            .ok_or_else(|| ChartError::NotFound(name.to_string()))
    }
}

/// Helper to build a chart version for tests
pub fn chart_version(name: &str, version: &str) -> ChartVersion {
    ChartVersion {
        metadata: ChartMetadata {
            name: name.to_string(),
            version: version.to_string(),
            app_version: format!("app-{}", version),
            ..Default::default()
        },
        created: None,
        digest: format!("sha256:{}", version.replace('.', "")),
    }
}

/// Helper to build a catalog whose latest version is the first of `all`
pub fn catalog(all: Vec<ChartVersion>) -> Catalog {
    Catalog {
        latest: all.first().cloned().unwrap_or_default(),
        all,
    }
}
