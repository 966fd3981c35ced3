//! Chart client errors

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to a chart registry
#[derive(Debug, Error)]
pub enum ChartError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with an unexpected status
    #[error("Registry error: {0}")]
    Registry(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anonymous access was refused
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Repository URL is not a usable OCI reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// No repository registered under this name
    #[error("Repository not registered: {0}")]
    NotRegistered(String),

    /// Repository registered but never refreshed
    #[error("Repository index not loaded: {0}")]
    NotRefreshed(String),

    /// Repository has no chart versions
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
