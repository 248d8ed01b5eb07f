//! Profile lifecycle: create, switch, rename, archive.
//!
//! Switching is sequential by construction: the store closes the old
//! profile's handle before the new one opens. Deleting a profile archives
//! its id in the registry; the store file stays on disk but can never be
//! opened as a profile again.

use std::sync::Arc;

use questlog_domain::{Faction, Profile, ProfileId};

use crate::infrastructure::persistence::ProfileRegistry;
use crate::infrastructure::ports::{ClockPort, ProgressStore, StoreError};

pub struct ProfileManager {
    registry: Arc<ProfileRegistry>,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn ClockPort>,
}

impl ProfileManager {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        store: Arc<dyn ProgressStore>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
        }
    }

    pub async fn create(&self, name: &str, faction: Faction) -> Result<Profile, StoreError> {
        let profile = Profile::new(name, faction, self.clock.now());
        self.registry.save_profile(&profile).await?;
        tracing::info!("profile created: {} ({})", profile.name, profile.id);
        Ok(profile)
    }

    pub async fn list(&self) -> Result<Vec<Profile>, StoreError> {
        self.registry.list_profiles().await
    }

    pub async fn get(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        self.registry.get_profile(id).await
    }

    /// Make `id` the active profile: open its store (closing the previous
    /// one) and record it as active.
    pub async fn switch_to(&self, id: &ProfileId) -> Result<Profile, StoreError> {
        let profile = self
            .registry
            .get_profile(id)
            .await?
            .ok_or(StoreError::ProfileNotFound(*id))?;

        self.store.set_profile(id).await?;
        self.registry.set_active_profile(id).await?;
        Ok(profile)
    }

    pub async fn rename(&self, id: &ProfileId, name: &str) -> Result<Profile, StoreError> {
        let mut profile = self
            .registry
            .get_profile(id)
            .await?
            .ok_or(StoreError::ProfileNotFound(*id))?;
        profile.name = name.to_string();
        self.registry.save_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn set_level(&self, id: &ProfileId, level: u32) -> Result<Profile, StoreError> {
        let mut profile = self
            .registry
            .get_profile(id)
            .await?
            .ok_or(StoreError::ProfileNotFound(*id))?;
        profile.level = level;
        self.registry.save_profile(&profile).await?;
        Ok(profile)
    }

    /// Archive the profile. Its store file is kept on disk but the id is
    /// tombstoned, so the data cannot be reopened or migrated by accident.
    /// If the profile was active, the store is closed and the marker
    /// cleared.
    pub async fn delete(&self, id: &ProfileId) -> Result<(), StoreError> {
        if self.store.active_profile().await.as_ref() == Some(id) {
            self.store.close().await;
            self.registry.clear_active_profile().await?;
        }
        self.registry.archive_profile(id).await?;
        tracing::info!("profile archived: {id}");
        Ok(())
    }

    pub async fn active_profile(&self) -> Result<Option<Profile>, StoreError> {
        let Some(id) = self.registry.active_profile_id().await? else {
            return Ok(None);
        };
        self.registry.get_profile(&id).await
    }
}
