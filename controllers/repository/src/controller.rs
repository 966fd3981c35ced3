//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the OCI chart client and the component sink together and runs the
//! `Repository` watcher until it exits or a shutdown signal arrives.

use crate::catalog::WatcherDeps;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::sink::KubeSink;
use crate::watcher::Watcher;
use chart_client::OciChartClient;
use crds::Repository;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for Repository resources.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    repository_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Repository Controller");

        let kube_client = Client::try_default().await?;
        let chart_client = OciChartClient::new(config.registry_request_timeout).map_err(|e| {
            error!("Failed to build registry HTTP client: {}", e);
            ControllerError::Chart(e)
        })?;

        let deps = WatcherDeps {
            chart_client: Arc::new(chart_client),
            sink: Arc::new(KubeSink::new(kube_client.clone())),
            default_interval: config.default_poll_interval,
        };
        let reconciler = Arc::new(Reconciler::new(deps, config.retry_min, config.retry_max));

        let repository_api: Api<Repository> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };
        let watcher = Watcher::new(reconciler.clone(), kube_client, repository_api);

        let repository_watcher = tokio::spawn(async move { watcher.watch_repositories().await });

        Ok(Self {
            reconciler,
            repository_watcher,
        })
    }

    /// Runs until the watcher exits or Ctrl-C, then stops every catalog watcher.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Repository Controller running");

        let result = tokio::select! {
            result = &mut self.repository_watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("Repository watcher panicked: {}", e)))
                    .and_then(|r| r.map_err(|e| ControllerError::Watch(format!("Repository watcher error: {}", e))))
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                self.repository_watcher.abort();
                Ok(())
            }
        };

        self.reconciler.stop_all().await;
        info!("Repository Controller stopped");
        result
    }
}
