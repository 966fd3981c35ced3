//! OCI catalog watcher.
//!
//! Registers an OCI repository with the chart client and drives its poll loop
//! on a dedicated task until stopped.

use super::poll::CatalogPoller;
use super::{CatalogWatcher, WatcherDeps};
use crate::error::ControllerError;
use chart_client::{oci_entry_name, ChartClientTrait, RepositoryEntry};
use crds::Repository;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A running poll loop and the token that ends it
struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Catalog watcher for `oci` repositories
pub struct OciWatcher {
    poller: Arc<CatalogPoller>,
    chart_client: Arc<dyn ChartClientTrait>,
    entry: RepositoryEntry,
    task: Mutex<Option<PollTask>>,
}

impl OciWatcher {
    /// Creates a stopped watcher for `repository`.
    pub fn new(repository: Arc<Repository>, deps: &WatcherDeps) -> Self {
        let interval = repository.poll_interval(deps.default_interval);
        let entry = RepositoryEntry {
            name: repository.namespaced_name(),
            url: repository.spec.url.clone(),
            insecure: repository.spec.insecure,
        };
        let poller = CatalogPoller::new(
            repository,
            deps.chart_client.clone(),
            deps.sink.clone(),
            interval,
            oci_entry_name,
        );
        Self {
            poller: Arc::new(poller),
            chart_client: deps.chart_client.clone(),
            entry,
            task: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl CatalogWatcher for OciWatcher {
    async fn start(&self) -> Result<(), ControllerError> {
        if self.task.lock().unwrap_or_else(PoisonError::into_inner).is_some() {
            debug!("Catalog watcher for {} already started", self.entry.name);
            return Ok(());
        }

        if let Err(e) = self
            .chart_client
            .register(self.entry.clone(), self.poller.transport_timeout())
            .await
        {
            error!("Failed to register repository {} ({}): {}", self.entry.name, self.entry.url, e);
            return Err(e.into());
        }

        // Fresh token per start: a token cancelled by stop cannot be reused.
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(self.poller.clone(), cancel.clone()));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(PollTask { cancel, handle });
        info!(
            "Started catalog watcher for {} (every {}s)",
            self.entry.name,
            self.poller.interval().as_secs()
        );
        Ok(())
    }

    async fn stop(&self) {
        info!("Stopping catalog watcher for {}", self.entry.name);
        if let Err(e) = self.chart_client.unregister(&self.entry.name).await {
            warn!("Failed to unregister repository {}: {}", self.entry.name, e);
        }

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(PollTask { cancel, handle }) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!("Poll loop for {} ended abnormally: {}", self.entry.name, e);
            }
        }
    }
}

/// Poll every interval until cancelled. The first poll happens one interval
/// after start; a cancel never interrupts a poll already running. Deadlines
/// are applied per step inside the poll, never to the cycle as a whole.
async fn run_poll_loop(poller: Arc<CatalogPoller>, cancel: CancellationToken) {
    let interval = poller.interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let outcome = poller.poll().await;
                debug!("Poll of {} finished: {:?}", poller.registration(), outcome);
            }
        }
    }
    debug!("Poll loop for {} exited", poller.registration());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_repository_with_interval, MockSink};
    use chart_client::mock::{catalog, chart_version};
    use chart_client::MockChartClient;
    use std::time::Duration;

    const KEY: &str = "default.charts";

    fn watcher(client: &MockChartClient, sink: &MockSink, interval_seconds: u64) -> OciWatcher {
        let repository =
            test_repository_with_interval("charts", "default", "oci://ghcr.io/org/nginx", interval_seconds);
        let deps = WatcherDeps {
            chart_client: Arc::new(client.clone()),
            sink: Arc::new(sink.clone()),
            default_interval: Duration::from_secs(120),
        };
        OciWatcher::new(Arc::new(repository), &deps)
    }

    fn client_with_catalog() -> MockChartClient {
        let client = MockChartClient::new();
        client.set_catalog(KEY, catalog(vec![chart_version("nginx", "1.0.0")]));
        client
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_after_one_interval() {
        let client = client_with_catalog();
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 60);

        watcher.start().await.unwrap();
        assert!(client.is_registered(KEY));
        assert_eq!(client.register_timeouts(), vec![Duration::from_secs(30)]);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(client.refresh_calls(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(client.refresh_calls(), 1);
        assert!(sink.component("default", "charts.nginx").is_some());

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let client = client_with_catalog();
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 60);

        watcher.start().await.unwrap();
        watcher.stop().await;
        assert!(!client.is_registered(KEY));
        assert_eq!(client.unregistered(), vec![KEY.to_string()]);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(client.refresh_calls(), 0);
        assert!(sink.components().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_failed_start() {
        let client = client_with_catalog();
        client.fail_register(true);
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 60);

        assert!(matches!(watcher.start().await, Err(ControllerError::Chart(_))));
        watcher.stop().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(client.refresh_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_retried_next_interval() {
        let client = client_with_catalog();
        client.fail_next_fetches(1);
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 10);

        watcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(client.fetch_calls(), 1);
        assert!(sink.components().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(client.fetch_calls(), 2);
        assert_eq!(sink.components().len(), 1);
        assert_eq!(sink.condition_updates().len(), 1);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_cycles_still_update_conditions() {
        let client = client_with_catalog();
        let sink = MockSink::new();
        sink.delay_creates(Duration::from_secs(11));
        let watcher = watcher(&client, &sink, 10);

        watcher.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(47)).await;

        // ticks at 10s, 20s, 30s, 40s; each create gives up after 5s
        assert_eq!(client.refresh_calls(), 4);
        assert!(sink.components().is_empty());
        assert_eq!(sink.condition_updates().len(), 4);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_polls_again() {
        let client = client_with_catalog();
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 10);

        watcher.start().await.unwrap();
        watcher.stop().await;
        watcher.start().await.unwrap();
        assert!(client.is_registered(KEY));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(client.refresh_calls(), 2);
        assert!(sink.component("default", "charts.nginx").is_some());

        watcher.stop().await;
        assert!(!client.is_registered(KEY));
        assert_eq!(client.unregistered(), vec![KEY.to_string(), KEY.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_registers_once() {
        let client = client_with_catalog();
        let sink = MockSink::new();
        let watcher = watcher(&client, &sink, 60);

        watcher.start().await.unwrap();
        watcher.start().await.unwrap();
        assert_eq!(client.register_timeouts().len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(client.refresh_calls(), 1);
        watcher.stop().await;
    }
}
