//! Versioned export/import bundles for progress data.
//!
//! Every collection appears as a plain array (record for keyed data) so the
//! bundle stays diffable and hand-editable. A document missing `version` or
//! `exportedAt` is rejected; any individual collection may be absent and
//! defaults to empty.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use questlog_domain::{Faction, PrestigeId, Profile, ProfileId};

use crate::infrastructure::persistence::{
    profile_store_path, ProfileRegistry, SetCollection, StoreConnection, UserPreferences,
};
use crate::infrastructure::ports::{ClockPort, StoreError};

pub const EXPORT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported document: {0}")]
    Unsupported(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One profile's collections, as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub completed_collector_items: Vec<String>,
    #[serde(default)]
    pub completed_hideout_parts: Vec<String>,
    #[serde(default)]
    pub completed_achievements: Vec<String>,
    #[serde(default)]
    pub storyline_objectives: Vec<String>,
    #[serde(default)]
    pub storyline_nodes: Vec<String>,
    #[serde(default)]
    pub working_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<UserPreferences>,
    #[serde(default)]
    pub prestige: HashMap<String, Value>,
}

impl ProfileData {
    fn set_entries(&self, collection: SetCollection) -> &[String] {
        match collection {
            SetCollection::CompletedTasks => &self.completed_tasks,
            SetCollection::CompletedCollectorItems => &self.completed_collector_items,
            SetCollection::CompletedHideoutParts => &self.completed_hideout_parts,
            SetCollection::CompletedAchievements => &self.completed_achievements,
            SetCollection::StorylineObjectives => &self.storyline_objectives,
            SetCollection::StorylineNodes => &self.storyline_nodes,
            SetCollection::WorkingOn => &self.working_on,
        }
    }

    fn set_entries_mut(&mut self, collection: SetCollection) -> &mut Vec<String> {
        match collection {
            SetCollection::CompletedTasks => &mut self.completed_tasks,
            SetCollection::CompletedCollectorItems => &mut self.completed_collector_items,
            SetCollection::CompletedHideoutParts => &mut self.completed_hideout_parts,
            SetCollection::CompletedAchievements => &mut self.completed_achievements,
            SetCollection::StorylineObjectives => &mut self.storyline_objectives,
            SetCollection::StorylineNodes => &mut self.storyline_nodes,
            SetCollection::WorkingOn => &mut self.working_on,
        }
    }
}

/// A single profile's bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: ProfileData,
}

impl ProfileExport {
    pub fn from_json(text: &str) -> Result<Self, ExportError> {
        let value = checked_document(text)?;
        serde_json::from_value(value).map_err(|err| ExportError::Serialization(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ExportError::Serialization(err.to_string()))
    }
}

/// The whole installation: every profile plus the active marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllProfilesExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile_id: Option<ProfileId>,
    #[serde(default)]
    pub profiles: Vec<ProfileBundle>,
}

impl AllProfilesExport {
    pub fn from_json(text: &str) -> Result<Self, ExportError> {
        let value = checked_document(text)?;
        serde_json::from_value(value).map_err(|err| ExportError::Serialization(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ExportError::Serialization(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBundle {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub faction: Faction,
    #[serde(default = "default_level")]
    pub level: u32,
    pub created_at: DateTime<Utc>,
    pub data: ProfileData,
}

fn default_level() -> u32 {
    1
}

/// Reject anything without the version/exportedAt envelope before letting
/// serde default the rest.
fn checked_document(text: &str) -> Result<Value, ExportError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ExportError::Serialization(err.to_string()))?;
    let Some(fields) = value.as_object() else {
        return Err(ExportError::Unsupported("not a JSON object".to_string()));
    };
    if !fields.contains_key("version") || !fields.contains_key("exportedAt") {
        return Err(ExportError::Unsupported(
            "missing version/exportedAt".to_string(),
        ));
    }
    Ok(value)
}

pub struct ExportService {
    data_dir: PathBuf,
    registry: Arc<ProfileRegistry>,
    clock: Arc<dyn ClockPort>,
}

impl ExportService {
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

    pub async fn export_profile(&self, id: &ProfileId) -> Result<ProfileExport, ExportError> {
        let data = self.read_profile_data(id).await?;
        Ok(ProfileExport {
            version: EXPORT_VERSION,
            exported_at: self.clock.now(),
            data,
        })
    }

    /// Write a bundle into the named profile's store: set collections are
    /// replaced wholesale, keyed records upserted.
    pub async fn import_profile(
        &self,
        id: &ProfileId,
        export: &ProfileExport,
    ) -> Result<(), ExportError> {
        self.write_profile_data(id, &export.data).await
    }

    /// Export every profile, one store at a time (never two handles open at
    /// once).
    pub async fn export_all(&self) -> Result<AllProfilesExport, ExportError> {
        let mut bundles = Vec::new();
        for profile in self.registry.list_profiles().await? {
            let data = self.read_profile_data(&profile.id).await?;
            bundles.push(ProfileBundle {
                id: profile.id,
                name: profile.name,
                faction: profile.faction,
                level: profile.level,
                created_at: profile.created_at,
                data,
            });
        }

        Ok(AllProfilesExport {
            version: EXPORT_VERSION,
            exported_at: self.clock.now(),
            active_profile_id: self.registry.active_profile_id().await?,
            profiles: bundles,
        })
    }

    /// Recreate every profile in the bundle, writing its data and restoring
    /// the active marker when the referenced profile is part of the bundle.
    pub async fn import_all(&self, export: &AllProfilesExport) -> Result<(), ExportError> {
        for bundle in &export.profiles {
            let profile = Profile {
                id: bundle.id,
                name: bundle.name.clone(),
                faction: bundle.faction,
                level: bundle.level,
                created_at: bundle.created_at,
            };
            self.registry.save_profile(&profile).await?;
            self.write_profile_data(&bundle.id, &bundle.data).await?;
        }

        if let Some(active) = export.active_profile_id {
            if export.profiles.iter().any(|bundle| bundle.id == active) {
                self.registry.set_active_profile(&active).await?;
            }
        }
        Ok(())
    }

    async fn read_profile_data(&self, id: &ProfileId) -> Result<ProfileData, ExportError> {
        let store = self.open_store(id).await?;

        let mut data = ProfileData::default();
        for collection in SetCollection::ALL {
            let mut entries: Vec<String> =
                store.load_set(collection).await?.into_iter().collect();
            entries.sort();
            *data.set_entries_mut(collection) = entries;
        }

        let rows = store.load_preference_rows().await?;
        if !rows.is_empty() {
            let mut preferences = UserPreferences::default();
            preferences.apply_rows(rows);
            data.preferences = Some(preferences);
        }

        data.prestige = store
            .load_prestige()
            .await?
            .into_iter()
            .map(|(id, value)| (id.into_string(), value))
            .collect();

        store.close().await;
        Ok(data)
    }

    async fn write_profile_data(
        &self,
        id: &ProfileId,
        data: &ProfileData,
    ) -> Result<(), ExportError> {
        let store = self.open_store(id).await?;

        for collection in SetCollection::ALL {
            let entries: HashSet<String> =
                data.set_entries(collection).iter().cloned().collect();
            store.save_set(collection, &entries).await?;
        }

        if let Some(preferences) = &data.preferences {
            store.upsert_preference_rows(&preferences.to_pairs()).await?;
        }

        if !data.prestige.is_empty() {
            let entries: HashMap<PrestigeId, Value> = data
                .prestige
                .iter()
                .map(|(id, value)| (PrestigeId::new(id.clone()), value.clone()))
                .collect();
            store.upsert_prestige(&entries).await?;
        }

        store.close().await;
        Ok(())
    }

    async fn open_store(&self, id: &ProfileId) -> Result<StoreConnection, ExportError> {
        let path = profile_store_path(&self.data_dir, id);
        Ok(StoreConnection::open(&path, self.clock.clone()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use chrono::TimeZone;

    use crate::infrastructure::clock::FixedClock;

    fn fixed_clock() -> Arc<dyn ClockPort> {
        let now = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("timestamp");
        Arc::new(FixedClock(now))
    }

    async fn service_in(dir: &Path) -> (ExportService, Arc<ProfileRegistry>) {
        let clock = fixed_clock();
        let registry = Arc::new(
            ProfileRegistry::open(dir, clock.clone())
                .await
                .expect("registry"),
        );
        (
            ExportService::new(dir.to_path_buf(), registry.clone(), clock),
            registry,
        )
    }

    async fn seed_profile_store(dir: &Path, id: &ProfileId, tasks: &[&str]) {
        let store = StoreConnection::open(&profile_store_path(dir, id), fixed_clock())
            .await
            .expect("open");
        let entries: HashSet<String> = tasks.iter().map(|task| task.to_string()).collect();
        store
            .save_set(SetCollection::CompletedTasks, &entries)
            .await
            .expect("seed");
        store.close().await;
    }

    #[tokio::test]
    async fn profile_bundle_round_trips_through_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, _registry) = service_in(dir.path()).await;

        let source = ProfileId::new();
        seed_profile_store(dir.path(), &source, &["t2", "t1"]).await;

        let export = service.export_profile(&source).await.expect("export");
        assert_eq!(export.version, EXPORT_VERSION);
        // Arrays are sorted for stable diffs.
        assert_eq!(export.data.completed_tasks, vec!["t1", "t2"]);

        let text = export.to_json().expect("to json");
        let parsed = ProfileExport::from_json(&text).expect("from json");

        let target = ProfileId::new();
        service
            .import_profile(&target, &parsed)
            .await
            .expect("import");

        let reimported = service.export_profile(&target).await.expect("re-export");
        assert_eq!(reimported.data, export.data);
    }

    #[tokio::test]
    async fn documents_without_the_envelope_are_rejected() {
        assert!(matches!(
            ProfileExport::from_json(r#"{"completedTasks": ["t1"]}"#),
            Err(ExportError::Unsupported(_))
        ));
        assert!(matches!(
            ProfileExport::from_json(r#"{"version": 2, "completedTasks": []}"#),
            Err(ExportError::Unsupported(_))
        ));
        assert!(matches!(
            AllProfilesExport::from_json("[]"),
            Err(ExportError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn absent_collections_default_to_empty() {
        let text = r#"{"version": 2, "exportedAt": "2023-11-14T22:13:20Z"}"#;
        let export = ProfileExport::from_json(text).expect("parse");
        assert!(export.data.completed_tasks.is_empty());
        assert!(export.data.prestige.is_empty());
        assert!(export.data.preferences.is_none());
    }

    #[tokio::test]
    async fn all_profiles_export_restores_directory_and_active_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (service, registry) = service_in(dir.path()).await;

        let profile = Profile::new("Main", Faction::Bear, fixed_clock().now());
        registry.save_profile(&profile).await.expect("save");
        registry
            .set_active_profile(&profile.id)
            .await
            .expect("active");
        seed_profile_store(dir.path(), &profile.id, &["t1"]).await;

        let export = service.export_all().await.expect("export all");
        assert_eq!(export.profiles.len(), 1);
        assert_eq!(export.active_profile_id, Some(profile.id));

        // Import into a clean installation.
        let other_dir = tempfile::tempdir().expect("tempdir");
        let (other_service, other_registry) = service_in(other_dir.path()).await;
        other_service.import_all(&export).await.expect("import all");

        assert_eq!(
            other_registry.list_profiles().await.expect("list").len(),
            1
        );
        assert_eq!(
            other_registry.active_profile_id().await.expect("active"),
            Some(profile.id)
        );
        let reimported = other_service
            .export_profile(&profile.id)
            .await
            .expect("re-export");
        assert_eq!(reimported.data.completed_tasks, vec!["t1"]);
    }
}
