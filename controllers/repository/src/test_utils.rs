//! Test utilities for unit testing the catalog watcher and reconciler
//!
//! Provides `Repository` fixtures and an in-memory `ComponentSink`.

use crate::sink::{ComponentSink, SinkError};
use async_trait::async_trait;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Helper to create a test OCI Repository with a uid
pub fn test_repository(name: &str, namespace: &str, url: &str) -> Repository {
    Repository {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}-{}", namespace, name)),
            generation: Some(1),
            ..Default::default()
        },
        spec: RepositorySpec {
            url: url.to_string(),
            repository_type: RepositoryType::Oci,
            insecure: false,
            pull_strategy: None,
            filter: Vec::new(),
            keyword_len_limit: 0,
        },
        status: None,
    }
}

/// Helper to create a test Repository polling every `interval_seconds`
pub fn test_repository_with_interval(name: &str, namespace: &str, url: &str, interval_seconds: u64) -> Repository {
    let mut repository = test_repository(name, namespace, url);
    repository.spec.pull_strategy = Some(PullStrategy {
        interval_seconds: Some(interval_seconds),
    });
    repository
}

#[derive(Default)]
struct SinkState {
    components: BTreeMap<(String, String), Component>,
    condition_updates: Vec<Vec<Condition>>,
    fail_creates: bool,
    create_delay: Option<Duration>,
}

/// In-memory sink that mimics the API server's create semantics
#[derive(Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create fail with a non-conflict error
    pub fn fail_creates(&self, fail: bool) {
        self.state.lock().unwrap().fail_creates = fail;
    }

    /// Make every create take `delay` before it reaches the store
    pub fn delay_creates(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = Some(delay);
    }

    /// Every stored component, ordered by namespace and name
    pub fn components(&self) -> Vec<Component> {
        self.state.lock().unwrap().components.values().cloned().collect()
    }

    /// Stored component by namespace and name
    pub fn component(&self, namespace: &str, name: &str) -> Option<Component> {
        self.state
            .lock()
            .unwrap()
            .components
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every batch of conditions written, oldest first
    pub fn condition_updates(&self) -> Vec<Vec<Condition>> {
        self.state.lock().unwrap().condition_updates.clone()
    }
}

#[async_trait]
impl ComponentSink for MockSink {
    async fn create_component(&self, component: &Component) -> Result<(), SinkError> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_creates {
            return Err(SinkError::MissingMetadata("mock create failure".to_string()));
        }
        let key = (component.namespace().unwrap_or_default(), component.name_any());
        if state.components.contains_key(&key) {
            return Err(SinkError::AlreadyExists(key.1));
        }
        state.components.insert(key, component.clone());
        Ok(())
    }

    async fn update_conditions(&self, _repository: &Repository, conditions: Vec<Condition>) -> Result<(), SinkError> {
        self.state.lock().unwrap().condition_updates.push(conditions);
        Ok(())
    }
}
