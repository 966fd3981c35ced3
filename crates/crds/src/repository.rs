//! Repository CRD
//!
//! Registers a remote chart catalog. The controller starts one catalog watcher
//! per `Repository`, restarts it when the spec changes and stops it when the
//! resource is deleted.

use crate::condition::Condition;
use crate::filter::FilterCond;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// RepositorySpec defines a remote chart catalog to mirror
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "catalog.microscaler.io",
    version = "v1alpha1",
    kind = "Repository",
    namespaced,
    status = "RepositoryStatus",
    shortname = "repo"
)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySpec {
    /// Catalog URL (e.g., "oci://ghcr.io/org/charts/nginx")
    pub url: String,

    /// Transport used to reach the catalog
    #[serde(default)]
    pub repository_type: RepositoryType,

    /// Talk plain HTTP to the registry instead of HTTPS
    #[serde(default)]
    pub insecure: bool,

    /// Polling cadence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_strategy: Option<PullStrategy>,

    /// Per-chart filter conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterCond>,

    /// Maximum number of keywords copied to a Component (0 = unlimited)
    #[serde(default)]
    pub keyword_len_limit: usize,
}

/// Repository transport type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// OCI distribution registry holding Helm charts
    #[default]
    Oci,

    /// Classic Helm HTTP repository (index.yaml)
    Http,
}

impl std::fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oci => f.write_str("oci"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// How often the catalog is polled
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PullStrategy {
    /// Seconds between two polls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
}

/// RepositoryStatus defines the observed state of a Repository
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatus {
    /// Readiness and sync conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Repository {
    /// Key under which the repository is registered with the chart client:
    /// `{namespace}.{name}`.
    pub fn namespaced_name(&self) -> String {
        format!(
            "{}.{}",
            self.namespace().unwrap_or_else(|| "default".to_string()),
            self.name_any()
        )
    }

    /// Poll interval from the pull strategy, or `default` when unset or zero.
    pub fn poll_interval(&self, default: Duration) -> Duration {
        self.spec
            .pull_strategy
            .as_ref()
            .and_then(|p| p.interval_seconds)
            .filter(|secs| *secs > 0)
            .map_or(default, Duration::from_secs)
    }

    /// Filter conditions keyed by chart name. Later entries for the same name win.
    pub fn filter_map(&self) -> HashMap<String, FilterCond> {
        self.spec
            .filter
            .iter()
            .map(|f| (f.name.clone(), f.clone()))
            .collect()
    }
}
