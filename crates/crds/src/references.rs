//! Kubernetes object references for ChartSync CRDs
//!
//! A `Component` records which `Repository` it was derived from. The reference
//! follows the Kubernetes `ObjectReference` shape (apiVersion, kind, name,
//! namespace, uid) so tooling can follow it back to the owner.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference from a `Component` back to its `Repository`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryReference {
    /// API version of the referenced resource (e.g., "catalog.microscaler.io/v1alpha1")
    pub api_version: String,

    /// Kind of the referenced resource ("Repository")
    pub kind: String,

    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// UID of the referenced resource, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl RepositoryReference {
    /// Create a reference to a `Repository` in the ChartSync API group
    pub fn repository(name: String, namespace: Option<String>, uid: Option<String>) -> Self {
        Self {
            api_version: format!("{}/v1alpha1", crate::API_GROUP),
            kind: "Repository".to_string(),
            name,
            namespace,
            uid,
        }
    }
}
