//! Repository Controller
//!
//! Mirrors remote Helm chart catalogs into the cluster:
//! - Repository: a remote OCI chart catalog, polled on an interval
//! - Component: one per chart, created from the latest catalog state
//!
//! Each Repository gets its own catalog watcher task; deleting or editing the
//! Repository stops or restarts it.

mod backoff;
mod catalog;
mod config;
mod controller;
mod error;
mod filter;
mod reconciler;
mod sink;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull in rustls; pin the ring provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Repository Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Default poll interval: {}s", config.default_poll_interval.as_secs());
    info!("  Registry request timeout: {}s", config.registry_request_timeout.as_secs());
    info!(
        "  Retry backoff: {}s..{}s",
        config.retry_min.as_secs(),
        config.retry_max.as_secs()
    );

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
