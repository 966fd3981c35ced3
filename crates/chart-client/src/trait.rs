//! ChartClient trait for mocking
//!
//! This trait abstracts the chart registry client so catalog watchers can be
//! unit tested against an in-memory implementation.

use crate::error::ChartError;
use crate::models::{Catalog, RepositoryEntry};
use std::time::Duration;

/// Trait for chart catalog operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ChartClientTrait: Send + Sync {
    /// Register a repository under `entry.name`, checking the registry is reachable
    /// within `timeout`. Registering an existing name replaces it.
    async fn register(&self, entry: RepositoryEntry, timeout: Duration) -> Result<(), ChartError>;

    /// Reload the index snapshot of a registered repository within `timeout`
    async fn refresh(&self, name: &str, timeout: Duration) -> Result<(), ChartError>;

    /// Forget a registered repository and its snapshot
    async fn unregister(&self, name: &str) -> Result<(), ChartError>;

    /// Latest version and full version set from the current snapshot
    async fn fetch_catalog(&self, name: &str) -> Result<Catalog, ChartError>;
}
