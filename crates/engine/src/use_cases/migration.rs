//! One-time transfer of progress data from older storage generations.
//!
//! Runs at startup, before the profile store is trusted, and never blocks
//! it: every failure is logged and swallowed. At-most-once per installation
//! is tracked with durable registry flags, not per-profile state - the flag
//! is set even when the source store does not exist, so later starts do not
//! keep probing for it.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use questlog_domain::ProfileId;

use crate::infrastructure::persistence::{
    default_store_path, legacy_store_path, profile_store_path, ProfileRegistry, SetCollection,
    StoreConnection,
};
use crate::infrastructure::ports::{ClockPort, StoreError};

/// Registry flag: the pre-profile single store has been migrated.
pub const LEGACY_MIGRATION_FLAG: &str = "legacy_store_migrated";
/// Registry flag: the "default"-named store has been migrated.
pub const DEFAULT_MIGRATION_FLAG: &str = "default_store_migrated";

pub struct MigrationRunner {
    data_dir: PathBuf,
    registry: Arc<ProfileRegistry>,
    clock: Arc<dyn ClockPort>,
}

impl MigrationRunner {
    pub fn new(
        data_dir: PathBuf,
        registry: Arc<ProfileRegistry>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            data_dir,
            registry,
            clock,
        }
    }

    /// Run both migrations into `target`. Never fails startup.
    pub async fn run(&self, target: &ProfileId) {
        self.run_once(LEGACY_MIGRATION_FLAG, "legacy store", || {
            self.migrate_legacy(target)
        })
        .await;
        self.run_once(DEFAULT_MIGRATION_FLAG, "default store", || {
            self.migrate_default(target)
        })
        .await;
    }

    async fn run_once<F, Fut>(&self, flag: &str, label: &str, migrate: F)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(), StoreError>>,
    {
        match self.registry.flag(flag).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("could not read {label} migration flag: {err}");
                return;
            }
        }

        if let Err(err) = migrate().await {
            tracing::warn!("{label} migration failed: {err}");
        }

        // The flag advances even on failure or when the source is absent;
        // this keeps the migration at-most-once per installation.
        if let Err(err) = self.registry.set_flag(flag).await {
            tracing::warn!("could not record {label} migration flag: {err}");
        }
    }

    /// Migration 1: the pre-profile single store. Collections are written
    /// into the target verbatim (first-write, not merge). The source file is
    /// kept; the flag alone prevents a re-run.
    async fn migrate_legacy(&self, target: &ProfileId) -> Result<(), StoreError> {
        let source_path = legacy_store_path(&self.data_dir);
        if !source_path.exists() {
            return Ok(());
        }

        let source = StoreConnection::open(&source_path, self.clock.clone()).await?;
        let target_store = self.open_target(target).await?;

        for collection in [
            SetCollection::CompletedTasks,
            SetCollection::CompletedCollectorItems,
            SetCollection::CompletedHideoutParts,
            SetCollection::CompletedAchievements,
        ] {
            let entries = source.load_set(collection).await?;
            target_store.save_set(collection, &entries).await?;
        }

        let prestige = source.load_prestige().await?;
        target_store.upsert_prestige(&prestige).await?;

        source.close().await;
        target_store.close().await;
        tracing::info!("legacy store migrated into profile {target}");
        Ok(())
    }

    /// Migration 2: the "default"-named store. An empty default store (no
    /// completed tasks) counts as never used and is left alone. When data is
    /// present, set collections are merged (union) into the target and keyed
    /// records are copied only where the target has none - existing user
    /// data always wins. The source store is deleted on success so it cannot
    /// be migrated or double-counted again.
    async fn migrate_default(&self, target: &ProfileId) -> Result<(), StoreError> {
        let source_path = default_store_path(&self.data_dir);
        if !source_path.exists() {
            return Ok(());
        }

        let source = StoreConnection::open(&source_path, self.clock.clone()).await?;

        let completed_tasks = source.load_set(SetCollection::CompletedTasks).await?;
        if completed_tasks.is_empty() {
            source.close().await;
            tracing::info!("default store is unused, skipping migration");
            return Ok(());
        }

        let target_store = self.open_target(target).await?;

        for collection in SetCollection::ALL {
            let from_source = source.load_set(collection).await?;
            if from_source.is_empty() {
                continue;
            }
            let mut merged = target_store.load_set(collection).await?;
            merged.extend(from_source);
            target_store.save_set(collection, &merged).await?;
        }

        let existing = target_store.load_prestige().await?;
        let mut new_entries = HashMap::new();
        for (id, data) in source.load_prestige().await? {
            if !existing.contains_key(&id) {
                new_entries.insert(id, data);
            }
        }
        if !new_entries.is_empty() {
            target_store.upsert_prestige(&new_entries).await?;
        }

        let target_rows = target_store.load_preference_rows().await?;
        let new_rows: Vec<(String, String)> = source
            .load_preference_rows()
            .await?
            .into_iter()
            .filter(|(key, _)| !target_rows.iter().any(|(existing, _)| existing == key))
            .collect();
        if !new_rows.is_empty() {
            target_store.upsert_preference_rows(&new_rows).await?;
        }

        source.close().await;
        target_store.close().await;

        fs::remove_file(&source_path).map_err(StoreError::database)?;
        tracing::info!("default store migrated into profile {target} and removed");
        Ok(())
    }

    async fn open_target(&self, target: &ProfileId) -> Result<StoreConnection, StoreError> {
        let path = profile_store_path(&self.data_dir, target);
        StoreConnection::open(&path, self.clock.clone()).await
    }
}
