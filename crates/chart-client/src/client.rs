//! OCI chart registry client
//!
//! Implements [`ChartClientTrait`] against the OCI distribution API:
//! `/v2/<repo>/tags/list`, `/v2/<repo>/manifests/<tag>` and
//! `/v2/<repo>/blobs/<digest>` (the Helm config blob holding `Chart.yaml`).

use crate::chart_trait::ChartClientTrait;
use crate::common::reference::{tag_to_version, OciReference};
use crate::common::RegistryHttp;
use crate::error::ChartError;
use crate::models::*;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
const HELM_CONFIG_MEDIA_TYPE: &str = "application/vnd.cncf.helm.config.v1+json";
const CREATED_ANNOTATION: &str = "org.opencontainers.image.created";
const CONTENT_DIGEST_HEADER: &str = "docker-content-digest";

/// Manifests fetched concurrently during a refresh
const FETCH_CONCURRENCY: usize = 4;

struct RegisteredRepository {
    entry: RepositoryEntry,
    reference: OciReference,
    // Newest first. None until the first successful refresh.
    snapshot: Option<Arc<Vec<ChartVersion>>>,
}

/// OCI chart registry client
pub struct OciChartClient {
    http: RegistryHttp,
    repositories: Mutex<HashMap<String, RegisteredRepository>>,
}

impl std::fmt::Debug for OciChartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciChartClient").finish_non_exhaustive()
    }
}

impl OciChartClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `request_timeout` - Upper bound for a single HTTP request
    pub fn new(request_timeout: Duration) -> Result<Self, ChartError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("chartsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http: RegistryHttp::new(client),
            repositories: Mutex::new(HashMap::new()),
        })
    }

    fn lookup(&self, name: &str) -> Result<(RepositoryEntry, OciReference, Option<Arc<Vec<ChartVersion>>>), ChartError> {
        let repositories = self.repositories.lock().unwrap_or_else(PoisonError::into_inner);
        let registered = repositories
            .get(name)
            .ok_or_else(|| ChartError::NotRegistered(name.to_string()))?;
        Ok((
            registered.entry.clone(),
            registered.reference.clone(),
            registered.snapshot.clone(),
        ))
    }

    /// Check the registry answers the distribution API base endpoint.
    /// 401 counts as reachable: pulls authenticate per repository.
    async fn ping(&self, reference: &OciReference, insecure: bool) -> Result<(), ChartError> {
        let url = format!("{}/v2/", reference.base_url(insecure));
        debug!("Pinging registry {}", url);

        let response = self.http.client().get(&url).send().await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::UNAUTHORIZED => Ok(()),
            s => Err(ChartError::Registry(format!("GET {} returned {}", url, s))),
        }
    }

    async fn list_tags(&self, reference: &OciReference, insecure: bool) -> Result<Vec<String>, ChartError> {
        let url = format!(
            "{}/v2/{}/tags/list",
            reference.base_url(insecure),
            reference.repository
        );
        let (list, _) = self
            .http
            .get_json::<OciTagList>(&url, "application/json", &reference.pull_scope())
            .await?;
        Ok(list.tags.unwrap_or_default())
    }

    async fn load_version(
        &self,
        reference: &OciReference,
        insecure: bool,
        tag: &str,
    ) -> Result<ChartVersion, ChartError> {
        let base = reference.base_url(insecure);
        let scope = reference.pull_scope();

        let manifest_url = format!("{}/v2/{}/manifests/{}", base, reference.repository, tag);
        let (manifest, headers) = self
            .http
            .get_json::<OciManifest>(&manifest_url, OCI_MANIFEST_MEDIA_TYPE, &scope)
            .await?;

        if !manifest.config.media_type.is_empty() && manifest.config.media_type != HELM_CONFIG_MEDIA_TYPE {
            return Err(ChartError::Registry(format!(
                "{}:{} is not a Helm chart (config media type {})",
                reference.repository, tag, manifest.config.media_type
            )));
        }

        let blob_url = format!("{}/v2/{}/blobs/{}", base, reference.repository, manifest.config.digest);
        let (metadata, _) = self
            .http
            .get_json::<ChartMetadata>(&blob_url, HELM_CONFIG_MEDIA_TYPE, &scope)
            .await?;

        let digest = headers
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let created = manifest
            .annotations
            .get(CREATED_ANNOTATION)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(ChartVersion { metadata, created, digest })
    }

    /// Load every chart version, reusing versions already in `previous`.
    /// Published chart versions are immutable, so a known tag is not fetched again.
    async fn load_versions(
        &self,
        reference: &OciReference,
        insecure: bool,
        previous: Option<&[ChartVersion]>,
    ) -> Result<Vec<ChartVersion>, ChartError> {
        let known: HashMap<&str, &ChartVersion> = previous
            .unwrap_or_default()
            .iter()
            .map(|v| (v.version(), v))
            .collect();

        let mut tags: Vec<(String, semver::Version)> = self
            .list_tags(reference, insecure)
            .await?
            .into_iter()
            .filter_map(|tag| match semver::Version::parse(&tag_to_version(&tag)) {
                Ok(version) => Some((tag, version)),
                Err(_) => {
                    debug!("Skipping non-version tag {} in {}", tag, reference.repository);
                    None
                }
            })
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1));

        let mut reused = 0usize;
        let results: Vec<Result<ChartVersion, ChartError>> = stream::iter(tags)
            .map(|(tag, _)| {
                let cached = known.get(tag_to_version(&tag).as_str()).map(|v| (*v).clone());
                if cached.is_some() {
                    reused += 1;
                }
                async move {
                    match cached {
                        Some(version) => Ok(version),
                        None => self.load_version(reference, insecure, &tag).await,
                    }
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut versions = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(version) => versions.push(version),
                Err(e) => warn!("Skipping unreadable version in {}: {}", reference.repository, e),
            }
        }
        debug!(
            "Loaded {} versions of {} ({} reused from previous snapshot)",
            versions.len(),
            reference.repository,
            reused
        );
        Ok(versions)
    }
}

#[async_trait::async_trait]
impl ChartClientTrait for OciChartClient {
    async fn register(&self, entry: RepositoryEntry, timeout: Duration) -> Result<(), ChartError> {
        let reference = OciReference::parse(&entry.url)?;
        tokio::time::timeout(timeout, self.ping(&reference, entry.insecure))
            .await
            .map_err(|_| ChartError::Timeout(timeout))??;

        info!("Registered chart repository {} ({})", entry.name, entry.url);
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                entry.name.clone(),
                RegisteredRepository { entry, reference, snapshot: None },
            );
        Ok(())
    }

    async fn refresh(&self, name: &str, timeout: Duration) -> Result<(), ChartError> {
        let (entry, reference, previous) = self.lookup(name)?;
        let versions = tokio::time::timeout(
            timeout,
            self.load_versions(&reference, entry.insecure, previous.as_deref().map(Vec::as_slice)),
        )
        .await
        .map_err(|_| ChartError::Timeout(timeout))??;

        let mut repositories = self.repositories.lock().unwrap_or_else(PoisonError::into_inner);
        // Unregistered while the refresh was in flight: drop the result.
        if let Some(registered) = repositories.get_mut(name) {
            if registered.entry == entry {
                registered.snapshot = Some(Arc::new(versions));
            }
        }
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), ChartError> {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|_| info!("Unregistered chart repository {}", name))
            .ok_or_else(|| ChartError::NotRegistered(name.to_string()))
    }

    async fn fetch_catalog(&self, name: &str) -> Result<Catalog, ChartError> {
        let (entry, _, snapshot) = self.lookup(name)?;
        let all = snapshot.ok_or_else(|| ChartError::NotRefreshed(name.to_string()))?;
        let latest = all
            .first()
            .cloned()
            .ok_or_else(|| ChartError::NotFound(format!("no chart versions in {}", entry.url)))?;
        Ok(Catalog { latest, all: all.as_ref().clone() })
    }
}
