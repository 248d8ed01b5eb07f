//! Application state and composition.
//!
//! The store handle is constructed exactly once here and shared explicitly;
//! its lifecycle (`set_profile`/`close`) is driven through the use cases,
//! never through implicit module state.

use std::sync::Arc;

use questlog_domain::{Faction, Profile, ProfileId};

use crate::config::EngineConfig;
use crate::infrastructure::{
    cache::{FreshCache, CACHE_FILE_NAME},
    clock::SystemClock,
    overlay_source::HttpOverlaySource,
    persistence::{ProfileRegistry, SqliteProfileStore},
    ports::{ClockPort, ProgressStore, StoreError},
    upstream::UpstreamClient,
};
use crate::use_cases::{
    CatalogService, CompletionTracker, ExportService, MigrationRunner, ProfileManager,
};

/// Main application state.
///
/// Holds the shared infrastructure handles and the use cases built on them.
pub struct App {
    pub store: Arc<dyn ProgressStore>,
    pub registry: Arc<ProfileRegistry>,
    pub profiles: ProfileManager,
    pub catalog: CatalogService,
    pub completion: CompletionTracker,
    pub exporter: ExportService,
    migrations: MigrationRunner,
}

impl App {
    pub async fn new(config: &EngineConfig) -> Result<Self, StoreError> {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());

        let registry =
            Arc::new(ProfileRegistry::open(&config.data_dir, clock.clone()).await?);
        let store: Arc<dyn ProgressStore> = Arc::new(SqliteProfileStore::new(
            config.data_dir.clone(),
            registry.clone(),
            clock.clone(),
        ));

        let upstream = Arc::new(UpstreamClient::new(config.api_url.clone()));
        let overlay_source = Arc::new(HttpOverlaySource::new(config.overlay_url.clone()));
        let cache = FreshCache::new(config.data_dir.join(CACHE_FILE_NAME), clock.clone());

        Ok(Self {
            profiles: ProfileManager::new(registry.clone(), store.clone(), clock.clone()),
            catalog: CatalogService::new(upstream, overlay_source, cache),
            completion: CompletionTracker::new(store.clone()),
            exporter: ExportService::new(config.data_dir.clone(), registry.clone(), clock.clone()),
            migrations: MigrationRunner::new(config.data_dir.clone(), registry.clone(), clock),
            store,
            registry,
        })
    }

    /// Startup sequence: resolve (or create) the active profile, run the
    /// one-time migrations into it before the store is trusted, then open
    /// its store and load the completed set.
    pub async fn start(&self) -> Result<Profile, StoreError> {
        let profile = match self.profiles.active_profile().await? {
            Some(profile) => profile,
            None => match self.profiles.list().await?.into_iter().next() {
                Some(profile) => profile,
                None => self.profiles.create("Main", Faction::default()).await?,
            },
        };

        self.migrations.run(&profile.id).await;

        self.profiles.switch_to(&profile.id).await?;
        self.completion.activate().await?;
        Ok(profile)
    }

    /// Change the active profile: close-then-open the store, then reload
    /// the completed set from the new namespace.
    pub async fn switch_profile(&self, id: &ProfileId) -> Result<Profile, StoreError> {
        let profile = self.profiles.switch_to(id).await?;
        self.completion.activate().await?;
        Ok(profile)
    }
}
