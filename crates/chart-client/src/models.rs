//! Chart catalog models
//!
//! `ChartMetadata` follows the JSON form of `Chart.yaml` that Helm stores as the
//! config blob of an OCI chart artifact. The `Oci*` types cover the subset of
//! the distribution API this client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A repository as registered with the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    /// Registration key (`{namespace}.{name}` of the owning Repository)
    pub name: String,
    /// Catalog URL (`oci://registry/path`)
    pub url: String,
    /// Use plain HTTP
    pub insecure: bool,
}

/// Chart maintainer as written in `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Chart metadata (`Chart.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub deprecated: bool,
}

/// One published version of a chart
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartVersion {
    pub metadata: ChartMetadata,
    /// Publication time (`org.opencontainers.image.created`), when present
    pub created: Option<DateTime<Utc>>,
    /// Manifest digest
    pub digest: String,
}

impl ChartVersion {
    /// Version string as published, without any normalization
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Whether the chart author marked this version deprecated
    pub fn deprecated(&self) -> bool {
        self.metadata.deprecated
    }
}

/// Catalog of a single chart: the latest version and every known version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub latest: ChartVersion,
    /// Newest first
    pub all: Vec<ChartVersion>,
}

/// `GET /v2/<name>/tags/list`
#[derive(Debug, Clone, Deserialize)]
pub struct OciTagList {
    pub name: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Content descriptor inside a manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciDescriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

/// OCI image manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciManifest {
    #[serde(default)]
    pub schema_version: u32,
    pub config: OciDescriptor,
    #[serde(default)]
    pub layers: Vec<OciDescriptor>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Token endpoint response; registries use either field
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    pub fn into_token(self) -> Option<String> {
        self.token.or(self.access_token).filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_metadata_from_helm_config() {
        let json = r#"{
            "name": "nginx",
            "version": "15.1.0",
            "appVersion": "1.25.3",
            "apiVersion": "v2",
            "description": "NGINX Open Source",
            "keywords": ["nginx", "http", "web"],
            "maintainers": [{"name": "Bitnami", "url": "https://github.com/bitnami/charts"}],
            "annotations": {"category": "Infrastructure"},
            "type": "application"
        }"#;
        let meta: ChartMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "nginx");
        assert_eq!(meta.app_version, "1.25.3");
        assert_eq!(meta.keywords.len(), 3);
        assert_eq!(meta.maintainers[0].email, None);
        assert_eq!(meta.annotations["category"], "Infrastructure");
        assert!(!meta.deprecated);
    }

    #[test]
    fn test_token_response_prefers_token() {
        let r: TokenResponse = serde_json::from_str(r#"{"token":"a","access_token":"b"}"#).unwrap();
        assert_eq!(r.into_token().as_deref(), Some("a"));

        let r: TokenResponse = serde_json::from_str(r#"{"access_token":"b"}"#).unwrap();
        assert_eq!(r.into_token().as_deref(), Some("b"));

        let r: TokenResponse = serde_json::from_str(r#"{"token":""}"#).unwrap();
        assert_eq!(r.into_token(), None);
    }
}
