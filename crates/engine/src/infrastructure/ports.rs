//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - Upstream task data (could swap the GraphQL API for a bundled dump)
//! - The overlay document source (remote with bundled fallback)
//! - Profile-scoped persistence (could swap SQLite for another store)
//! - Clock (for testing freshness and timestamps)
//!
//! Two error philosophies meet here and must stay separated: fetch failures
//! are strict, typed errors; cache corruption and absent optional data are
//! not errors at all and never surface through these types.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use questlog_domain::{
    Achievement, HideoutStation, Item, Overlay, PrestigeId, ProfileId, Task,
};

use crate::infrastructure::persistence::{PreferencesUpdate, SetCollection, UserPreferences};

// =============================================================================
// Error Types
// =============================================================================

/// Strict failures from the upstream fetch layer. Never swallowed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("GraphQL error: {0}")]
    GraphQl(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("profile {0} not found")]
    ProfileNotFound(ProfileId),
    #[error("profile {0} has been deleted")]
    ProfileArchived(ProfileId),
    #[error("no active profile store")]
    NoActiveProfile,
}

impl StoreError {
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

// =============================================================================
// Fetch Types
// =============================================================================

/// The combined upstream fetch result. Every section defaults to empty when
/// the response omits it, so callers never null-check.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedPayload {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub collector_items: Vec<Item>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub hideout_stations: Vec<HideoutStation>,
}

// =============================================================================
// Ports
// =============================================================================

/// Upstream data source: one combined query, one attempt, no retries.
#[async_trait]
pub trait UpstreamPort: Send + Sync {
    async fn fetch_combined(&self) -> Result<CombinedPayload, FetchError>;
}

/// Overlay document source. Loading is best-effort by contract: on any
/// remote failure the implementation falls back to a bundled copy, so this
/// never fails.
#[async_trait]
pub trait OverlaySourcePort: Send + Sync {
    async fn load(&self) -> Overlay;
}

/// Profile-scoped persistence. One profile's store is open at a time;
/// switching closes the previous handle first.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Open the named profile's store, closing any currently open one.
    /// Idempotent: a no-op when already connected to `profile_id`. Refuses
    /// archived profile ids.
    async fn set_profile(&self, profile_id: &ProfileId) -> Result<(), StoreError>;

    /// Close the active store, if any.
    async fn close(&self);

    /// The profile whose store is currently open.
    async fn active_profile(&self) -> Option<ProfileId>;

    /// Load a full-replace set collection.
    async fn load_set(&self, collection: SetCollection) -> Result<HashSet<String>, StoreError>;

    /// Replace a set collection wholesale: clear, then write every member.
    async fn save_set(
        &self,
        collection: SetCollection,
        entries: &HashSet<String>,
    ) -> Result<(), StoreError>;

    /// Reconstruct preferences from stored keys, defaulting missing ones.
    async fn load_preferences(&self) -> Result<UserPreferences, StoreError>;

    /// Upsert only the keys present in `update`; other keys are untouched.
    async fn save_preferences(&self, update: &PreferencesUpdate) -> Result<(), StoreError>;

    /// All stored prestige records, keyed by prestige id.
    async fn load_prestige(&self) -> Result<HashMap<PrestigeId, Value>, StoreError>;

    /// Upsert the provided prestige records; other ids are untouched.
    async fn save_prestige(
        &self,
        entries: &HashMap<PrestigeId, Value>,
    ) -> Result<(), StoreError>;
}

// =============================================================================
// Testability Ports
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
