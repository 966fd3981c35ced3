//! Catalog watchers.
//!
//! A catalog watcher owns the periodic sync of one `Repository`: it registers
//! the repository with the chart client, polls it on a fixed interval and
//! writes a `Component` per chart through the sink.

pub mod oci;
pub mod poll;

use crate::error::ControllerError;
use crate::sink::ComponentSink;
use chart_client::ChartClientTrait;
use crds::{Repository, RepositoryType};
use std::sync::Arc;
use std::time::Duration;

pub use oci::OciWatcher;

/// Lifecycle of a per-repository catalog watcher
#[async_trait::async_trait]
pub trait CatalogWatcher: Send + Sync {
    /// Register the repository and schedule polling. Returns as soon as the
    /// loop is scheduled; the first poll happens one interval later.
    async fn start(&self) -> Result<(), ControllerError>;

    /// Unregister the repository and wait for the poll loop to exit. Safe to
    /// call after a failed `start`.
    async fn stop(&self);
}

/// Shared collaborators handed to every watcher
#[derive(Clone)]
pub struct WatcherDeps {
    pub chart_client: Arc<dyn ChartClientTrait>,
    pub sink: Arc<dyn ComponentSink>,
    /// Interval for repositories that do not set one
    pub default_interval: Duration,
}

/// Build the watcher matching the repository's transport type
pub fn new_catalog_watcher(
    repository: Arc<Repository>,
    deps: &WatcherDeps,
) -> Result<Box<dyn CatalogWatcher>, ControllerError> {
    match repository.spec.repository_type {
        RepositoryType::Oci => Ok(Box::new(OciWatcher::new(repository, deps))),
        other => Err(ControllerError::UnsupportedRepositoryType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_repository, MockSink};
    use chart_client::MockChartClient;

    fn deps() -> WatcherDeps {
        WatcherDeps {
            chart_client: Arc::new(MockChartClient::new()),
            sink: Arc::new(MockSink::new()),
            default_interval: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_http_repository_unsupported() {
        let mut repository = test_repository("charts", "default", "https://charts.example.com");
        repository.spec.repository_type = RepositoryType::Http;
        let result = new_catalog_watcher(Arc::new(repository), &deps());
        assert!(matches!(result, Err(ControllerError::UnsupportedRepositoryType(t)) if t == "http"));
    }

    #[test]
    fn test_oci_repository_gets_watcher() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        assert!(new_catalog_watcher(Arc::new(repository), &deps()).is_ok());
    }
}
