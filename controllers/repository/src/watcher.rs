//! Kubernetes resource watchers.
//!
//! Watches `Repository` resources with `kube_runtime::Controller` and routes
//! each event through a finalizer, so deletions reach the reconciler before
//! the object disappears.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::Repository;
use futures::StreamExt;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Finalizer held on every watched `Repository`
pub const REPOSITORY_FINALIZER: &str = "catalog.microscaler.io/finalizer";

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    client: Client,
    repository_api: Api<Repository>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, client: Client, repository_api: Api<Repository>) -> Self {
        Self {
            reconciler,
            client,
            repository_api,
        }
    }

    /// Starts watching Repository resources. Runs until the watch stream ends.
    pub async fn watch_repositories(&self) -> Result<(), ControllerError> {
        info!("Starting Repository watcher");

        let error_policy = |repository: Arc<Repository>, error: &ControllerError, ctx: Arc<Reconciler>| {
            error!("Reconciliation error for Repository {}: {}", repository.namespaced_name(), error);
            Action::requeue(ctx.error_backoff(&repository))
        };

        let client = self.client.clone();
        let reconcile = move |repository: Arc<Repository>, ctx: Arc<Reconciler>| {
            let client = client.clone();
            async move {
                debug!("Reconciling Repository {}", repository.namespaced_name());
                reconcile_with_finalizer(client, repository, ctx).await
            }
        };

        // Debounce batches the status patches written after each poll
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(4);

        Controller::new(self.repository_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                if let Err(e) = res {
                    error!("Controller error for Repository: {}", e);
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile_with_finalizer(
    client: Client,
    repository: Arc<Repository>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    let namespace = repository.namespace().ok_or_else(|| {
        ControllerError::InvalidConfig(format!("Repository {} has no namespace", repository.name_any()))
    })?;
    let api: Api<Repository> = Api::namespaced(client, &namespace);

    finalizer(&api, REPOSITORY_FINALIZER, repository, |event| async move {
        match event {
            FinalizerEvent::Apply(repository) => ctx.reconcile_repository(repository).await,
            FinalizerEvent::Cleanup(repository) => ctx.cleanup_repository(repository).await,
        }
    })
    .await
    .map_err(ControllerError::from)
}
