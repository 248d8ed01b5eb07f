//! Catalog loading: cache-or-fetch, overlay application, graph build.
//!
//! The read path the rest of the system consumes: a fresh cache short-
//! circuits the network entirely; otherwise one fetch attempt, saved back to
//! the cache on success. A failed fetch with a loadable (stale) cache serves
//! the stale payload - offline beats empty. Overlay application and disabled
//! filtering happen after, so tombstoned tasks never reach the graph or any
//! view.

use std::sync::Arc;

use questlog_domain::{
    apply_overlay, Achievement, HideoutStation, Item, Task, TaskGraph,
};

use crate::infrastructure::cache::FreshCache;
use crate::infrastructure::ports::{
    CombinedPayload, FetchError, OverlaySourcePort, UpstreamPort,
};

/// The merged, graph-indexed task data set. Read-only from the outside.
pub struct TaskCatalog {
    pub tasks: Vec<Task>,
    pub graph: TaskGraph,
    pub collector_items: Vec<Item>,
    pub achievements: Vec<Achievement>,
    pub hideout_stations: Vec<HideoutStation>,
    /// Version of the overlay document that was applied, if it carried one.
    pub overlay_version: Option<u32>,
}

pub struct CatalogService {
    upstream: Arc<dyn UpstreamPort>,
    overlay_source: Arc<dyn OverlaySourcePort>,
    cache: FreshCache,
}

impl CatalogService {
    pub fn new(
        upstream: Arc<dyn UpstreamPort>,
        overlay_source: Arc<dyn OverlaySourcePort>,
        cache: FreshCache,
    ) -> Self {
        Self {
            upstream,
            overlay_source,
            cache,
        }
    }

    pub async fn load(&self) -> Result<TaskCatalog, FetchError> {
        let payload = match self.cached_if_fresh() {
            Some(payload) => payload,
            None => match self.upstream.fetch_combined().await {
                Ok(payload) => {
                    if let Err(err) = self.cache.save(&payload) {
                        tracing::warn!("could not save combined payload cache: {err}");
                    }
                    payload
                }
                Err(err) => match self.cache.load() {
                    Some(stale) => {
                        tracing::warn!("upstream fetch failed, serving stale cache: {err}");
                        stale
                    }
                    None => return Err(err),
                },
            },
        };

        let overlay = self.overlay_source.load().await;
        let overlay_version = overlay.meta.as_ref().map(|meta| meta.version);

        let tasks: Vec<Task> = payload
            .tasks
            .iter()
            .filter_map(|task| apply_overlay(task, &overlay))
            .collect();
        let graph = TaskGraph::build(&tasks);

        Ok(TaskCatalog {
            tasks,
            graph,
            collector_items: payload.collector_items,
            achievements: payload.achievements,
            hideout_stations: payload.hideout_stations,
            overlay_version,
        })
    }

    fn cached_if_fresh(&self) -> Option<CombinedPayload> {
        if self.cache.is_fresh() {
            self.cache.load()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use questlog_domain::Overlay;

    use crate::infrastructure::cache::CACHE_FILE_NAME;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{ClockPort, CombinedPayload};

    struct StubUpstream {
        payload: Result<CombinedPayload, ()>,
        calls: AtomicUsize,
    }

    impl StubUpstream {
        fn succeeding(payload: CombinedPayload) -> Self {
            Self {
                payload: Ok(payload),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                payload: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UpstreamPort for StubUpstream {
        async fn fetch_combined(&self) -> Result<CombinedPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.payload {
                Ok(payload) => Ok(payload.clone()),
                Err(()) => Err(FetchError::Http(503)),
            }
        }
    }

    struct StubOverlay(Overlay);

    #[async_trait]
    impl OverlaySourcePort for StubOverlay {
        async fn load(&self) -> Overlay {
            self.0.clone()
        }
    }

    fn clock() -> Arc<dyn ClockPort> {
        let now = chrono::Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("timestamp");
        Arc::new(FixedClock(now))
    }

    fn payload(task_ids: &[&str]) -> CombinedPayload {
        let tasks: Vec<_> = task_ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "name": id}))
            .collect();
        serde_json::from_value(serde_json::json!({ "tasks": tasks })).expect("payload")
    }

    fn service_in(
        dir: &std::path::Path,
        upstream: Arc<StubUpstream>,
        overlay: Overlay,
    ) -> CatalogService {
        let cache = FreshCache::new(dir.join(CACHE_FILE_NAME), clock());
        CatalogService::new(upstream, Arc::new(StubOverlay(overlay)), cache)
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_the_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upstream = Arc::new(StubUpstream::succeeding(payload(&["t1"])));

        // Seed the cache through a first load.
        let service = service_in(dir.path(), upstream.clone(), Overlay::default());
        service.load().await.expect("first load");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

        // Second load is served from cache.
        service.load().await.expect("second load");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_with_stale_cache_serves_stale() {
        let dir = tempfile::tempdir().expect("tempdir");

        // Write a cache envelope that is already past the TTL.
        let old_clock: Arc<dyn ClockPort> = {
            let stamp = chrono::Utc
                .timestamp_opt(1_700_000_000 - 10 * 60 * 60, 0)
                .single()
                .expect("timestamp");
            Arc::new(FixedClock(stamp))
        };
        FreshCache::new(dir.path().join(CACHE_FILE_NAME), old_clock)
            .save(&payload(&["stale-task"]))
            .expect("seed stale cache");

        let upstream = Arc::new(StubUpstream::failing());
        let service = service_in(dir.path(), upstream, Overlay::default());

        let catalog = service.load().await.expect("stale load");
        assert_eq!(catalog.tasks[0].id.as_str(), "stale-task");
    }

    #[tokio::test]
    async fn fetch_failure_without_cache_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upstream = Arc::new(StubUpstream::failing());
        let service = service_in(dir.path(), upstream, Overlay::default());

        assert!(matches!(service.load().await, Err(FetchError::Http(503))));
    }

    #[tokio::test]
    async fn disabled_tasks_never_reach_the_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upstream = Arc::new(StubUpstream::succeeding(payload(&["keep", "drop"])));
        let overlay: Overlay = serde_json::from_value(serde_json::json!({
            "tasks": {"drop": {"disabled": true}},
            "$meta": {"version": 4}
        }))
        .expect("overlay");

        let service = service_in(dir.path(), upstream, overlay);
        let catalog = service.load().await.expect("load");

        assert_eq!(catalog.tasks.len(), 1);
        assert_eq!(catalog.tasks[0].id.as_str(), "keep");
        assert!(!catalog.graph.contains(&"drop".into()));
        assert_eq!(catalog.overlay_version, Some(4));
    }
}
