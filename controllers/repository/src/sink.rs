//! Component sink.
//!
//! Where poll cycles write their results: `Component` creation and the
//! `Repository` status conditions. The trait keeps the catalog watcher
//! testable without a cluster; `KubeSink` is the cluster-backed implementation.

use crds::{upsert_condition, Component, Condition, Repository, RepositoryStatus};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Errors returned by a component sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The component already exists; callers treat this as success
    #[error("Component already exists: {0}")]
    AlreadyExists(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object lacks the metadata needed to address it
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),
}

impl SinkError {
    /// Classify a kube error, turning HTTP 409 into `AlreadyExists`.
    pub fn from_create(name: &str, e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ref resp) if resp.code == 409 => Self::AlreadyExists(name.to_string()),
            e => Self::Kube(e),
        }
    }
}

/// Destination for the resources derived from a catalog
#[async_trait::async_trait]
pub trait ComponentSink: Send + Sync {
    /// Create `component`. Must return `SinkError::AlreadyExists` when a
    /// component with the same name exists in the namespace.
    async fn create_component(&self, component: &Component) -> Result<(), SinkError>;

    /// Upsert `conditions` (by type) on the repository's status
    async fn update_conditions(&self, repository: &Repository, conditions: Vec<Condition>) -> Result<(), SinkError>;
}

/// Cluster-backed sink
#[derive(Clone)]
pub struct KubeSink {
    client: Client,
}

impl KubeSink {
    /// Creates a new sink on top of a Kubernetes client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ComponentSink for KubeSink {
    async fn create_component(&self, component: &Component) -> Result<(), SinkError> {
        let name = component.name_any();
        let namespace = component
            .namespace()
            .ok_or_else(|| SinkError::MissingMetadata(format!("Component {} has no namespace", name)))?;

        let api: Api<Component> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), component)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::from_create(&name, e))
    }

    async fn update_conditions(&self, repository: &Repository, conditions: Vec<Condition>) -> Result<(), SinkError> {
        let name = repository.name_any();
        let namespace = repository
            .namespace()
            .ok_or_else(|| SinkError::MissingMetadata(format!("Repository {} has no namespace", name)))?;

        let api: Api<Repository> = Api::namespaced(self.client.clone(), &namespace);
        // Re-read so conditions written by others since the watcher started survive.
        let current = api.get_status(&name).await?;
        let mut status: RepositoryStatus = current.status.unwrap_or_default();
        for condition in conditions {
            upsert_condition(&mut status.conditions, condition);
        }

        let status_patch = json!({
            "status": status
        });
        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;
        debug!("Updated Repository {}/{} conditions", namespace, name);
        Ok(())
    }
}
