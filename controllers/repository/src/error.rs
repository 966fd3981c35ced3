//! Controller-specific error types.
//!
//! This module defines error types specific to the Repository Controller
//! that are not covered by upstream library errors.

use crate::sink::SinkError;
use chart_client::ChartError;
use kube::Error as KubeError;
use kube_runtime::finalizer::Error as FinalizerError;
use thiserror::Error;

/// Errors that can occur in the Repository Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Chart registry error
    #[error("Chart registry error: {0}")]
    Chart(#[from] ChartError),

    /// Component sink error
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No catalog watcher exists for the repository type
    #[error("Unsupported repository type: {0}")]
    UnsupportedRepositoryType(String),

    /// Finalizer add/remove or cleanup failed
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<FinalizerError<ControllerError>>),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl From<FinalizerError<ControllerError>> for ControllerError {
    fn from(e: FinalizerError<ControllerError>) -> Self {
        Self::Finalizer(Box::new(e))
    }
}
