//! Top-level registry: the profile directory, the active profile marker,
//! and durable app flags (migration bookkeeping).
//!
//! Deleting a profile archives its id here instead of erasing the store
//! file, so a deleted profile's data can never be silently picked up again.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use questlog_domain::{Faction, Profile, ProfileId};

use crate::infrastructure::ports::{ClockPort, StoreError};

/// File name of the registry database inside the data directory.
pub const REGISTRY_DB_NAME: &str = "registry.db";

const ACTIVE_PROFILE_KEY: &str = "active_profile";

pub struct ProfileRegistry {
    pool: SqlitePool,
    clock: Arc<dyn ClockPort>,
}

impl ProfileRegistry {
    pub async fn open(data_dir: &Path, clock: Arc<dyn ClockPort>) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(StoreError::database)?;
        let path = data_dir.join(REGISTRY_DB_NAME);

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .map_err(StoreError::database)?;

        for statement in [
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                faction TEXT NOT NULL,
                level INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS archived_profiles (
                id TEXT PRIMARY KEY,
                archived_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
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

    pub async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, faction, level, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                faction = excluded.faction,
                level = excluded.level
            "#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.name)
        .bind(profile.faction.to_string())
        .bind(i64::from(profile.level))
        .bind(profile.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }

    pub async fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, faction, level, created_at FROM profiles WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::database)?;

        row.map(|row| decode_profile(&row)).transpose()
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, faction, level, created_at FROM profiles ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::database)?;

        rows.iter().map(decode_profile).collect()
    }

    /// Remove the profile from the directory and tombstone its id.
    pub async fn archive_profile(&self, id: &ProfileId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::database)?;

        sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::database)?;

        sqlx::query(
            "INSERT OR IGNORE INTO archived_profiles (id, archived_at) VALUES (?, ?)",
        )
        .bind(id.to_string())
        .bind(self.clock.now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::database)?;

        tx.commit().await.map_err(StoreError::database)
    }

    pub async fn is_archived(&self, id: &ProfileId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT id FROM archived_profiles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database)?;
        Ok(row.is_some())
    }

    pub async fn active_profile_id(&self) -> Result<Option<ProfileId>, StoreError> {
        let Some(value) = self.get_state(ACTIVE_PROFILE_KEY).await? else {
            return Ok(None);
        };
        match Uuid::parse_str(&value) {
            Ok(uuid) => Ok(Some(ProfileId::from_uuid(uuid))),
            Err(err) => {
                tracing::warn!("stored active profile id is unreadable: {err}");
                Ok(None)
            }
        }
    }

    pub async fn set_active_profile(&self, id: &ProfileId) -> Result<(), StoreError> {
        self.set_state(ACTIVE_PROFILE_KEY, &id.to_string()).await
    }

    pub async fn clear_active_profile(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM app_state WHERE key = ?")
            .bind(ACTIVE_PROFILE_KEY)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database)?;
        Ok(())
    }

    /// Durable boolean flag; used for at-most-once migration bookkeeping.
    pub async fn flag(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_state(key).await?.is_some())
    }

    pub async fn set_flag(&self, key: &str) -> Result<(), StoreError> {
        self.set_state(key, "true").await
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM app_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database)?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO app_state (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::database)?;
        Ok(())
    }
}

fn decode_profile(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, StoreError> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map(ProfileId::from_uuid)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;

    let faction: String = row.get("faction");
    let faction = faction.parse::<Faction>().unwrap_or(Faction::Unknown);

    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|err| StoreError::Serialization(err.to_string()))?;

    let level: i64 = row.get("level");

    Ok(Profile {
        id,
        name: row.get("name"),
        faction,
        level: u32::try_from(level).unwrap_or(1),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use chrono::TimeZone;

    fn fixed_clock() -> Arc<dyn ClockPort> {
        let now = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("timestamp");
        Arc::new(FixedClock(now))
    }

    async fn registry_in(dir: &Path) -> ProfileRegistry {
        ProfileRegistry::open(dir, fixed_clock())
            .await
            .expect("registry")
    }

    #[tokio::test]
    async fn profiles_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry_in(dir.path()).await;

        let profile = Profile::new("Main", Faction::Usec, fixed_clock().now());
        registry.save_profile(&profile).await.expect("save");

        let loaded = registry
            .get_profile(&profile.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded, profile);
        assert_eq!(registry.list_profiles().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn archive_removes_from_directory_and_tombstones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry_in(dir.path()).await;

        let profile = Profile::new("Short-lived", Faction::Bear, fixed_clock().now());
        registry.save_profile(&profile).await.expect("save");
        registry.archive_profile(&profile.id).await.expect("archive");

        assert!(registry
            .get_profile(&profile.id)
            .await
            .expect("get")
            .is_none());
        assert!(registry.is_archived(&profile.id).await.expect("archived"));
    }

    #[tokio::test]
    async fn active_profile_marker_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry_in(dir.path()).await;

        assert_eq!(registry.active_profile_id().await.expect("none"), None);

        let id = ProfileId::new();
        registry.set_active_profile(&id).await.expect("set");
        assert_eq!(registry.active_profile_id().await.expect("some"), Some(id));

        registry.clear_active_profile().await.expect("clear");
        assert_eq!(registry.active_profile_id().await.expect("cleared"), None);
    }

    #[tokio::test]
    async fn flags_are_durable_and_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry_in(dir.path()).await;

        assert!(!registry.flag("migrated").await.expect("unset"));
        registry.set_flag("migrated").await.expect("set");
        registry.set_flag("migrated").await.expect("set again");
        assert!(registry.flag("migrated").await.expect("set"));
    }
}
