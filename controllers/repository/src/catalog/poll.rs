//! Poll cycle.
//!
//! One poll refreshes the repository index, reads the catalog, rebuilds the
//! `Component` for the chart and asserts it into the sink. Every failing step
//! is logged and ends the cycle; the next tick is the retry.

use crate::filter::match_versions;
use crate::sink::{ComponentSink, SinkError};
use chart_client::{Catalog, ChartClientTrait};
use chrono::{DateTime, Utc};
use crds::{
    Component, ComponentSpec, ComponentVersion, Condition, FilterCond, Maintainer, Repository,
    RepositoryReference, COMPONENT_REPOSITORY_LABEL, DISPLAY_NAME_ANNOTATION,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How a poll cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Component created
    Created,
    /// Component already present; counted as success
    AlreadyExists,
    /// Sink rejected the component; conditions were still updated
    SinkFailed,
    /// A transport step failed; nothing was written
    Abandoned,
}

/// Runs poll cycles for one repository
pub struct CatalogPoller {
    repository: Arc<Repository>,
    chart_client: Arc<dyn ChartClientTrait>,
    sink: Arc<dyn ComponentSink>,
    registration: String,
    interval: Duration,
    filters: HashMap<String, FilterCond>,
    resolve_entry_name: fn(&str) -> String,
}

impl CatalogPoller {
    /// Creates a poller. `resolve_entry_name` maps the repository URL to the chart name.
    pub fn new(
        repository: Arc<Repository>,
        chart_client: Arc<dyn ChartClientTrait>,
        sink: Arc<dyn ComponentSink>,
        interval: Duration,
        resolve_entry_name: fn(&str) -> String,
    ) -> Self {
        Self {
            registration: repository.namespaced_name(),
            filters: repository.filter_map(),
            repository,
            chart_client,
            sink,
            interval,
            resolve_entry_name,
        }
    }

    /// Name the repository is registered under with the chart client
    pub fn registration(&self) -> &str {
        &self.registration
    }

    /// Time between two polls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Budget for each transport or sink call: half the poll interval
    pub fn transport_timeout(&self) -> Duration {
        self.interval / 2
    }

    /// Run one poll cycle.
    ///
    /// Every external call carries its own deadline, so a slow sink never
    /// prevents the conditions update at the end of the cycle.
    pub async fn poll(&self) -> PollOutcome {
        info!("Polling chart repository {}", self.registration);
        let now = Utc::now();
        let budget = self.transport_timeout();

        if let Err(e) = self.chart_client.refresh(&self.registration, budget).await {
            error!("Failed to refresh repository {}: {}", self.registration, e);
            return PollOutcome::Abandoned;
        }

        let entry_name = (self.resolve_entry_name)(&self.repository.spec.url);
        let catalog = match timeout(budget, self.chart_client.fetch_catalog(&self.registration)).await {
            Ok(Ok(catalog)) => catalog,
            Ok(Err(e)) => {
                error!("Cannot get charts of repository {}: {}", self.registration, e);
                return PollOutcome::Abandoned;
            }
            Err(_) => {
                error!(
                    "Reading charts of repository {} exceeded {}s",
                    self.registration,
                    budget.as_secs()
                );
                return PollOutcome::Abandoned;
            }
        };

        let component = build_component(&self.repository, &entry_name, &catalog, &self.filters, now);
        let component_name = component.name_any();
        let namespace = component.namespace().unwrap_or_default();
        debug!("Asserting Component {}/{}: {:?}", namespace, component_name, component.spec);

        let outcome = match timeout(budget, self.sink.create_component(&component)).await {
            Ok(Ok(())) => {
                info!("Created Component {}/{}", namespace, component_name);
                PollOutcome::Created
            }
            Ok(Err(SinkError::AlreadyExists(_))) => {
                debug!("Component {}/{} already exists", namespace, component_name);
                PollOutcome::AlreadyExists
            }
            Ok(Err(e)) => {
                error!("Failed to create Component {}/{}: {}", namespace, component_name, e);
                PollOutcome::SinkFailed
            }
            Err(_) => {
                error!(
                    "Creating Component {}/{} exceeded {}s",
                    namespace,
                    component_name,
                    budget.as_secs()
                );
                PollOutcome::SinkFailed
            }
        };

        let conditions = vec![Condition::ready(now), Condition::synced(now)];
        match timeout(budget, self.sink.update_conditions(&self.repository, conditions)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to update Repository {} conditions: {}", self.registration, e),
            Err(_) => error!(
                "Updating Repository {} conditions exceeded {}s",
                self.registration,
                budget.as_secs()
            ),
        }

        outcome
    }
}

/// Build the `Component` for `entry_name` from the latest catalog state.
pub fn build_component(
    repository: &Repository,
    entry_name: &str,
    catalog: &Catalog,
    filters: &HashMap<String, FilterCond>,
    now: DateTime<Utc>,
) -> Component {
    let repository_name = repository.name_any();
    let latest = &catalog.latest.metadata;

    let owner_references = match repository.owner_ref(&()) {
        Some(owner) => Some(vec![owner]),
        None => {
            warn!(
                "Repository {} has no uid, creating Component {}.{} without owner reference",
                repository_name, repository_name, entry_name
            );
            None
        }
    };

    let (retained, keep) = match_versions(filters, entry_name, &catalog.all);
    let versions = if keep {
        retained
            .into_iter()
            .filter_map(|i| catalog.all.get(i))
            .map(|v| ComponentVersion {
                version: v.metadata.version.clone(),
                app_version: v.metadata.app_version.clone(),
                created_at: v.created,
                updated_at: now,
                digest: v.digest.clone(),
                deprecated: v.metadata.deprecated,
                annotations: v.metadata.annotations.clone(),
            })
            .collect()
    } else {
        debug!("Chart {} filtered out of {}, keeping metadata only", entry_name, repository_name);
        Vec::new()
    };

    Component {
        metadata: ObjectMeta {
            name: Some(format!("{}.{}", repository_name, entry_name)),
            namespace: repository.namespace(),
            labels: Some(BTreeMap::from([(
                COMPONENT_REPOSITORY_LABEL.to_string(),
                repository_name.clone(),
            )])),
            owner_references,
            ..Default::default()
        },
        spec: ComponentSpec {
            repository_ref: RepositoryReference::repository(
                repository_name,
                repository.namespace(),
                repository.uid(),
            ),
            name: entry_name.to_string(),
            display_name: latest
                .annotations
                .get(DISPLAY_NAME_ANNOTATION)
                .cloned()
                .unwrap_or_default(),
            versions,
            description: latest.description.clone(),
            home: latest.home.clone(),
            icon: latest.icon.clone(),
            keywords: truncate_keywords(&latest.keywords, repository.spec.keyword_len_limit),
            sources: latest.sources.clone(),
            maintainers: dedup_maintainers(&latest.maintainers),
            deprecated: latest.deprecated,
        },
    }
}

/// Unique maintainers by name; the first occurrence wins and keeps its position.
pub fn dedup_maintainers(maintainers: &[chart_client::Maintainer]) -> Vec<Maintainer> {
    let mut seen = HashSet::new();
    maintainers
        .iter()
        .filter(|m| seen.insert(m.name.as_str()))
        .map(|m| Maintainer {
            name: m.name.clone(),
            email: m.email.clone(),
            url: m.url.clone(),
        })
        .collect()
}

/// First `limit` keywords; 0 means unlimited.
pub fn truncate_keywords(keywords: &[String], limit: usize) -> Vec<String> {
    match limit {
        0 => keywords.to_vec(),
        n => keywords.iter().take(n).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_repository, MockSink};
    use chart_client::mock::{catalog, chart_version};
    use chart_client::{oci_entry_name, MockChartClient};
    use crds::{FilterOperation, CONDITION_READY, CONDITION_SYNCED};

    fn maintainer(name: &str, email: &str) -> chart_client::Maintainer {
        chart_client::Maintainer {
            name: name.to_string(),
            email: Some(email.to_string()),
            url: None,
        }
    }

    fn nginx_catalog() -> Catalog {
        let mut latest = chart_version("nginx", "2.0.0");
        latest.metadata.description = "NGINX".to_string();
        latest.metadata.keywords = vec!["web".to_string(), "proxy".to_string()];
        latest.metadata.maintainers = vec![
            maintainer("a", "first@example.com"),
            maintainer("a", "second@example.com"),
            maintainer("b", "b@example.com"),
        ];
        latest.metadata.annotations = BTreeMap::from([(
            DISPLAY_NAME_ANNOTATION.to_string(),
            "Nginx Server".to_string(),
        )]);
        catalog(vec![latest, chart_version("nginx", "1.0.0")])
    }

    #[test]
    fn test_dedup_maintainers_first_occurrence_wins() {
        let deduped = dedup_maintainers(&[
            maintainer("a", "first@example.com"),
            maintainer("a", "second@example.com"),
            maintainer("b", "b@example.com"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "a");
        assert_eq!(deduped[0].email.as_deref(), Some("first@example.com"));
        assert_eq!(deduped[1].name, "b");
    }

    #[test]
    fn test_truncate_keywords() {
        let keywords: Vec<String> = (0..5).map(|i| format!("k{}", i)).collect();
        assert_eq!(truncate_keywords(&keywords, 2), vec!["k0", "k1"]);
        assert_eq!(truncate_keywords(&keywords, 0), keywords);
        assert_eq!(truncate_keywords(&keywords, 10), keywords);
    }

    #[test]
    fn test_keyword_limit_applied_to_component() {
        let k = 4;
        let mut repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        repository.spec.keyword_len_limit = k;
        let mut cat = nginx_catalog();
        cat.latest.metadata.keywords = (0..k + 3).map(|i| format!("kw{}", i)).collect();

        let component = build_component(&repository, "nginx", &cat, &HashMap::new(), Utc::now());
        assert_eq!(component.spec.keywords.len(), k);
        assert_eq!(component.spec.keywords, cat.latest.metadata.keywords[..k].to_vec());
    }

    #[test]
    fn test_build_component_metadata() {
        let repository = test_repository("charts", "kubebb-system", "oci://ghcr.io/org/nginx");
        let now = Utc::now();
        let component = build_component(&repository, "nginx", &nginx_catalog(), &HashMap::new(), now);

        assert_eq!(component.name_any(), "charts.nginx");
        assert_eq!(component.namespace().as_deref(), Some("kubebb-system"));
        assert_eq!(component.labels()[COMPONENT_REPOSITORY_LABEL], "charts");
        let owners = component.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners[0].kind, "Repository");
        assert_eq!(owners[0].name, "charts");
        assert_eq!(component.spec.repository_ref.uid, repository.uid());
        assert_eq!(component.spec.display_name, "Nginx Server");
        assert_eq!(component.spec.description, "NGINX");

        let maintainers: Vec<(&str, Option<&str>)> = component
            .spec
            .maintainers
            .iter()
            .map(|m| (m.name.as_str(), m.email.as_deref()))
            .collect();
        assert_eq!(
            maintainers,
            vec![("a", Some("first@example.com")), ("b", Some("b@example.com"))]
        );

        let versions: Vec<&str> = component.spec.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.0.0"]);
        assert!(component.spec.versions.iter().all(|v| v.updated_at == now));
        assert_eq!(component.spec.versions[0].digest, "sha256:200");
    }

    #[test]
    fn test_missing_uid_skips_owner_reference() {
        let mut repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        repository.metadata.uid = None;
        let component = build_component(&repository, "nginx", &nginx_catalog(), &HashMap::new(), Utc::now());
        assert!(component.metadata.owner_references.is_none());
        assert_eq!(component.name_any(), "charts.nginx");
    }

    #[test]
    fn test_filtered_out_chart_keeps_metadata_only() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/x");
        let filters = HashMap::from([(
            "x".to_string(),
            FilterCond {
                name: "x".to_string(),
                operation: FilterOperation::Ignore,
                ..Default::default()
            },
        )]);
        let component = build_component(&repository, "x", &nginx_catalog(), &filters, Utc::now());
        assert_eq!(component.name_any(), "charts.x");
        assert!(component.spec.versions.is_empty());
        assert_eq!(component.spec.description, "NGINX");
    }

    fn poller(client: &MockChartClient, sink: &MockSink, repository: Repository) -> CatalogPoller {
        CatalogPoller::new(
            Arc::new(repository),
            Arc::new(client.clone()),
            Arc::new(sink.clone()),
            Duration::from_secs(60),
            oci_entry_name,
        )
    }

    async fn registered_client(repository: &Repository) -> MockChartClient {
        let client = MockChartClient::new();
        client
            .register(
                chart_client::RepositoryEntry {
                    name: repository.namespaced_name(),
                    url: repository.spec.url.clone(),
                    insecure: false,
                },
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        client.set_catalog(&repository.namespaced_name(), nginx_catalog());
        client
    }

    #[tokio::test]
    async fn test_poll_twice_is_idempotent() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        let client = registered_client(&repository).await;
        let sink = MockSink::new();
        let poller = poller(&client, &sink, repository);

        assert_eq!(poller.poll().await, PollOutcome::Created);
        assert_eq!(poller.poll().await, PollOutcome::AlreadyExists);

        assert_eq!(sink.components().len(), 1);
        assert!(sink.component("default", "charts.nginx").is_some());
        let updates = sink.condition_updates();
        assert_eq!(updates.len(), 2);
        let types: Vec<&str> = updates[1].iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec![CONDITION_READY, CONDITION_SYNCED]);
        assert_eq!(updates[1][0].last_transition_time, updates[1][1].last_transition_time);
        assert_eq!(client.refresh_timeouts(), vec![Duration::from_secs(30); 2]);
    }

    #[tokio::test]
    async fn test_refresh_failure_abandons_cycle() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        let client = registered_client(&repository).await;
        client.fail_next_refreshes(1);
        let sink = MockSink::new();
        let poller = poller(&client, &sink, repository);

        assert_eq!(poller.poll().await, PollOutcome::Abandoned);
        assert_eq!(client.fetch_calls(), 0);
        assert!(sink.components().is_empty());
        assert!(sink.condition_updates().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_abandons_cycle() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        let client = registered_client(&repository).await;
        client.fail_next_fetches(1);
        let sink = MockSink::new();
        let poller = poller(&client, &sink, repository);

        assert_eq!(poller.poll().await, PollOutcome::Abandoned);
        assert!(sink.components().is_empty());
        assert!(sink.condition_updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_still_updates_conditions() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        let client = registered_client(&repository).await;
        let sink = MockSink::new();
        sink.delay_creates(Duration::from_secs(61));
        let poller = poller(&client, &sink, repository);

        assert_eq!(poller.poll().await, PollOutcome::SinkFailed);
        assert!(sink.components().is_empty());
        let updates = sink.condition_updates();
        assert_eq!(updates.len(), 1);
        let types: Vec<&str> = updates[0].iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec![CONDITION_READY, CONDITION_SYNCED]);
    }

    #[tokio::test]
    async fn test_sink_failure_still_updates_conditions() {
        let repository = test_repository("charts", "default", "oci://ghcr.io/org/nginx");
        let client = registered_client(&repository).await;
        let sink = MockSink::new();
        sink.fail_creates(true);
        let poller = poller(&client, &sink, repository);

        assert_eq!(poller.poll().await, PollOutcome::SinkFailed);
        assert!(sink.components().is_empty());
        assert_eq!(sink.condition_updates().len(), 1);
    }
}
