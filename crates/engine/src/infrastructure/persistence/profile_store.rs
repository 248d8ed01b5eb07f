//! SQLite-backed profile store.
//!
//! Each profile owns one database file. Set collections use full-replace
//! semantics (clear + rewrite in one transaction, so a save never leaves
//! stale members); preferences and prestige records use keyed upserts.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use questlog_domain::{PrestigeId, ProfileId};

use crate::infrastructure::persistence::{
    PreferencesUpdate, ProfileRegistry, UserPreferences,
};
use crate::infrastructure::ports::{ClockPort, ProgressStore, StoreError};

/// Base name every store file derives from.
pub const STORE_BASE_NAME: &str = "progress";

/// Store file for a named profile.
pub fn profile_store_path(data_dir: &Path, profile_id: &ProfileId) -> PathBuf {
    data_dir.join(format!("{STORE_BASE_NAME}-{profile_id}.db"))
}

/// The single-profile store used before profiles existed.
pub fn legacy_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(format!("{STORE_BASE_NAME}.db"))
}

/// The store of the hardcoded "default" profile generation.
pub fn default_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(format!("{STORE_BASE_NAME}-default.db"))
}

/// The full-replace set collections a profile store carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetCollection {
    CompletedTasks,
    CompletedCollectorItems,
    CompletedHideoutParts,
    CompletedAchievements,
    StorylineObjectives,
    StorylineNodes,
    WorkingOn,
}

impl SetCollection {
    pub const ALL: [SetCollection; 7] = [
        SetCollection::CompletedTasks,
        SetCollection::CompletedCollectorItems,
        SetCollection::CompletedHideoutParts,
        SetCollection::CompletedAchievements,
        SetCollection::StorylineObjectives,
        SetCollection::StorylineNodes,
        SetCollection::WorkingOn,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SetCollection::CompletedTasks => "completed_tasks",
            SetCollection::CompletedCollectorItems => "completed_collector_items",
            SetCollection::CompletedHideoutParts => "completed_hideout_parts",
            SetCollection::CompletedAchievements => "completed_achievements",
            SetCollection::StorylineObjectives => "storyline_objectives",
            SetCollection::StorylineNodes => "storyline_nodes",
            SetCollection::WorkingOn => "working_on",
        }
    }
}

impl std::fmt::Display for SetCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One open store database. Also used directly by migrations and exports,
/// which read stores that are not the active profile's.
pub(crate) struct StoreConnection {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl StoreConnection {
    pub(crate) async fn open(path: &Path, clock: Arc<dyn ClockPort>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::database)?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .map_err(StoreError::database)?;

        for statement in [
            r#"
            CREATE TABLE IF NOT EXISTS completed (
                collection TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                PRIMARY KEY (collection, entry_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS prestige (
                prestige_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ] {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(StoreError::database)?;
        }

        Ok(Self { pool, clock })
    }

    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) async fn load_set(
        &self,
        collection: SetCollection,
    ) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query("SELECT entry_id FROM completed WHERE collection = ?")
            .bind(collection.key())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database)?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("entry_id"))
            .collect())
    }

    /// Clear the collection, then write every member, in one transaction.
    pub(crate) async fn save_set(
        &self,
        collection: SetCollection,
        entries: &HashSet<String>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::database)?;

        sqlx::query("DELETE FROM completed WHERE collection = ?")
            .bind(collection.key())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::database)?;

        for entry in entries {
            sqlx::query("INSERT INTO completed (collection, entry_id) VALUES (?, ?)")
                .bind(collection.key())
                .bind(entry)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::database)?;
        }

        tx.commit().await.map_err(StoreError::database)
    }

    pub(crate) async fn load_preference_rows(
        &self,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM preferences")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database)?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("key"), row.get::<String, _>("value")))
            .collect())
    }

    pub(crate) async fn upsert_preference_rows(
        &self,
        pairs: &[(String, String)],
    ) -> Result<(), StoreError> {
        let now = self.clock.now().to_rfc3339();
        for (key, value) in pairs {
            sqlx::query(
                r#"
                INSERT INTO preferences (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;
        }
        Ok(())
    }

    pub(crate) async fn load_prestige(
        &self,
    ) -> Result<HashMap<PrestigeId, Value>, StoreError> {
        let rows = sqlx::query("SELECT prestige_id, data FROM prestige")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database)?;

        let mut entries = HashMap::new();
        for row in rows {
            let id: String = row.get("prestige_id");
            let data: String = row.get("data");
            match serde_json::from_str(&data) {
                Ok(value) => {
                    entries.insert(PrestigeId::from(id), value);
                }
                Err(err) => {
                    tracing::warn!("skipping unreadable prestige record {id}: {err}");
                }
            }
        }
        Ok(entries)
    }

    pub(crate) async fn upsert_prestige(
        &self,
        entries: &HashMap<PrestigeId, Value>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now().to_rfc3339();
        for (id, data) in entries {
            let text = serde_json::to_string(data)
                .map_err(|err| StoreError::Serialization(err.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO prestige (prestige_id, data, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(prestige_id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(id.as_str())
            .bind(text)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;
        }
        Ok(())
    }
}

struct ActiveStore {
    profile_id: ProfileId,
    connection: StoreConnection,
}

/// The profile store: at most one profile's database open at a time.
pub struct SqliteProfileStore {
    data_dir: PathBuf,
    registry: Arc<ProfileRegistry>,
    clock: Arc<dyn ClockPort>,
    active: RwLock<Option<ActiveStore>>,
}

impl SqliteProfileStore {
    pub fn new(
        data_dir: PathBuf,
        registry: Arc<ProfileRegistry>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            data_dir,
            registry,
            clock,
            active: RwLock::new(None),
        }
    }
}

#[async_trait]
impl ProgressStore for SqliteProfileStore {
    async fn set_profile(&self, profile_id: &ProfileId) -> Result<(), StoreError> {
        let mut active = self.active.write().await;

        if active
            .as_ref()
            .is_some_and(|store| store.profile_id == *profile_id)
        {
            return Ok(());
        }

        if self.registry.is_archived(profile_id).await? {
            return Err(StoreError::ProfileArchived(*profile_id));
        }

        // Close before open: two profiles' handles are never live at once.
        if let Some(previous) = active.take() {
            previous.connection.close().await;
        }

        let path = profile_store_path(&self.data_dir, profile_id);
        let connection = StoreConnection::open(&path, self.clock.clone()).await?;
        tracing::info!("profile store opened: {}", path.display());

        *active = Some(ActiveStore {
            profile_id: *profile_id,
            connection,
        });
        Ok(())
    }

    async fn close(&self) {
        if let Some(previous) = self.active.write().await.take() {
            previous.connection.close().await;
        }
    }

    async fn active_profile(&self) -> Option<ProfileId> {
        self.active.read().await.as_ref().map(|store| store.profile_id)
    }

    async fn load_set(&self, collection: SetCollection) -> Result<HashSet<String>, StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        store.connection.load_set(collection).await
    }

    async fn save_set(
        &self,
        collection: SetCollection,
        entries: &HashSet<String>,
    ) -> Result<(), StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        store.connection.save_set(collection, entries).await
    }

    async fn load_preferences(&self) -> Result<UserPreferences, StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        let rows = store.connection.load_preference_rows().await?;
        let mut preferences = UserPreferences::default();
        preferences.apply_rows(rows);
        Ok(preferences)
    }

    async fn save_preferences(&self, update: &PreferencesUpdate) -> Result<(), StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        store
            .connection
            .upsert_preference_rows(&update.to_pairs())
            .await
    }

    async fn load_prestige(&self) -> Result<HashMap<PrestigeId, Value>, StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        store.connection.load_prestige().await
    }

    async fn save_prestige(
        &self,
        entries: &HashMap<PrestigeId, Value>,
    ) -> Result<(), StoreError> {
        let guard = self.active.read().await;
        let store = guard.as_ref().ok_or(StoreError::NoActiveProfile)?;
        store.connection.upsert_prestige(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use chrono::TimeZone;
    use questlog_domain::{Faction, Profile};

    fn fixed_clock() -> Arc<dyn ClockPort> {
        let now = chrono::Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("timestamp");
        Arc::new(FixedClock(now))
    }

    async fn store_in(dir: &Path) -> (SqliteProfileStore, Arc<ProfileRegistry>) {
        let clock = fixed_clock();
        let registry = Arc::new(
            ProfileRegistry::open(dir, clock.clone())
                .await
                .expect("registry"),
        );
        (
            SqliteProfileStore::new(dir.to_path_buf(), registry.clone(), clock),
            registry,
        )
    }

    fn set_of(entries: &[&str]) -> HashSet<String> {
        entries.iter().map(|entry| entry.to_string()).collect()
    }

    #[tokio::test]
    async fn save_set_replaces_wholesale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;
        let profile_id = ProfileId::new();
        store.set_profile(&profile_id).await.expect("set profile");

        store
            .save_set(SetCollection::CompletedTasks, &set_of(&["a", "b", "c"]))
            .await
            .expect("first save");
        store
            .save_set(SetCollection::CompletedTasks, &set_of(&["b"]))
            .await
            .expect("second save");

        let loaded = store
            .load_set(SetCollection::CompletedTasks)
            .await
            .expect("load");
        // No stale members survive a full replace.
        assert_eq!(loaded, set_of(&["b"]));
    }

    #[tokio::test]
    async fn collections_are_namespaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;
        store.set_profile(&ProfileId::new()).await.expect("set profile");

        store
            .save_set(SetCollection::CompletedTasks, &set_of(&["task-1"]))
            .await
            .expect("save tasks");
        store
            .save_set(SetCollection::CompletedAchievements, &set_of(&["ach-1"]))
            .await
            .expect("save achievements");

        assert_eq!(
            store
                .load_set(SetCollection::CompletedTasks)
                .await
                .expect("load"),
            set_of(&["task-1"])
        );
        assert_eq!(
            store
                .load_set(SetCollection::CompletedAchievements)
                .await
                .expect("load"),
            set_of(&["ach-1"])
        );
    }

    #[tokio::test]
    async fn preferences_update_touches_only_provided_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;
        store.set_profile(&ProfileId::new()).await.expect("set profile");

        store
            .save_preferences(&PreferencesUpdate {
                show_completed: Some(true),
                ..Default::default()
            })
            .await
            .expect("first update");
        store
            .save_preferences(&PreferencesUpdate {
                map_filter: Some(Some("customs".to_string())),
                ..Default::default()
            })
            .await
            .expect("second update");

        let preferences = store.load_preferences().await.expect("load");
        assert!(preferences.show_completed);
        assert_eq!(preferences.map_filter.as_deref(), Some("customs"));
        // Untouched key stays at its default.
        assert!(preferences.show_locked);
    }

    #[tokio::test]
    async fn prestige_upsert_leaves_other_ids_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;
        store.set_profile(&ProfileId::new()).await.expect("set profile");

        let mut first = HashMap::new();
        first.insert(PrestigeId::from("prestige-1"), serde_json::json!({"level": 1}));
        store.save_prestige(&first).await.expect("first save");

        let mut second = HashMap::new();
        second.insert(PrestigeId::from("prestige-2"), serde_json::json!({"level": 2}));
        store.save_prestige(&second).await.expect("second save");

        let loaded = store.load_prestige().await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.get(&PrestigeId::from("prestige-1")),
            Some(&serde_json::json!({"level": 1}))
        );
    }

    #[tokio::test]
    async fn profiles_are_isolated_and_switching_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;

        let first = ProfileId::new();
        let second = ProfileId::new();

        store.set_profile(&first).await.expect("open first");
        store
            .save_set(SetCollection::CompletedTasks, &set_of(&["task-1"]))
            .await
            .expect("save");

        // Re-requesting the same profile is a no-op.
        store.set_profile(&first).await.expect("idempotent");
        assert_eq!(store.active_profile().await, Some(first));

        store.set_profile(&second).await.expect("open second");
        assert_eq!(store.active_profile().await, Some(second));
        assert!(store
            .load_set(SetCollection::CompletedTasks)
            .await
            .expect("load")
            .is_empty());

        store.set_profile(&first).await.expect("back to first");
        assert_eq!(
            store
                .load_set(SetCollection::CompletedTasks)
                .await
                .expect("load"),
            set_of(&["task-1"])
        );
    }

    #[tokio::test]
    async fn archived_profile_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, registry) = store_in(dir.path()).await;

        let profile = Profile::new("Old", Faction::Bear, fixed_clock().now());
        registry.save_profile(&profile).await.expect("save profile");
        registry
            .archive_profile(&profile.id)
            .await
            .expect("archive");

        match store.set_profile(&profile.id).await {
            Err(StoreError::ProfileArchived(id)) => assert_eq!(id, profile.id),
            other => panic!("expected archived error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn operations_without_active_profile_fail_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (store, _registry) = store_in(dir.path()).await;

        assert!(matches!(
            store.load_set(SetCollection::CompletedTasks).await,
            Err(StoreError::NoActiveProfile)
        ));
    }
}
