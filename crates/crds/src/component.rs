//! Component CRD
//!
//! One `Component` per chart found in a `Repository`'s catalog. The catalog
//! watcher owns the content: every poll rebuilds it from the latest chart
//! metadata and the filtered version list.

use crate::references::RepositoryReference;
use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ComponentSpec mirrors a chart published in a repository catalog
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "catalog.microscaler.io",
    version = "v1alpha1",
    kind = "Component",
    namespaced,
    shortname = "comp"
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Repository this component was discovered in
    pub repository_ref: RepositoryReference,

    /// Chart name inside the repository
    pub name: String,

    /// Display name taken from the chart annotations
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    /// Retained versions, in the order chosen by the repository filter
    #[serde(default)]
    pub versions: Vec<ComponentVersion>,

    /// Chart description of the latest version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Project home page
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub home: String,

    /// Icon URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,

    /// Keywords, capped by the repository keyword limit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Source code links
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Maintainers, unique by name
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// Whether the latest version is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

/// A published version of a component
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentVersion {
    /// Chart version
    pub version: String,

    /// Version of the packaged application
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_version: String,

    /// When the version was published, if the registry recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When this record was last written by the watcher
    pub updated_at: DateTime<Utc>,

    /// Content digest of the chart artifact
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    /// Version is marked deprecated
    #[serde(default)]
    pub deprecated: bool,

    /// Free-form chart annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Chart maintainer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Maintainer {
    /// Maintainer name
    pub name: String,

    /// Contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Personal or organisation URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
