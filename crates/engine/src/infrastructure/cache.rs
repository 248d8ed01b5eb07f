//! Freshness cache over the combined upstream payload.
//!
//! One JSON envelope in one well-known file. Reads are deliberately lenient:
//! a missing or corrupted envelope is "no cache", never an error. Staleness
//! is governed by a fixed TTL constant, not configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{ClockPort, CombinedPayload, StoreError};

/// How long a saved payload counts as fresh.
pub const CACHE_TTL_SECS: i64 = 60 * 60;

/// File name of the cache envelope inside the data directory.
pub const CACHE_FILE_NAME: &str = "combined-cache.json";

/// The unit written to and read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub updated_at: DateTime<Utc>,
    pub payload: CombinedPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheEnvelopeRef<'a> {
    updated_at: DateTime<Utc>,
    payload: &'a CombinedPayload,
}

pub struct FreshCache {
    path: PathBuf,
    clock: Arc<dyn ClockPort>,
}

impl FreshCache {
    pub fn new(path: PathBuf, clock: Arc<dyn ClockPort>) -> Self {
        Self { path, clock }
    }

    /// Store the payload with the current timestamp.
    pub fn save(&self, payload: &CombinedPayload) -> Result<(), StoreError> {
        let envelope = CacheEnvelopeRef {
            updated_at: self.clock.now(),
            payload,
        };
        let text = serde_json::to_string(&envelope)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::database)?;
        }
        fs::write(&self.path, text).map_err(StoreError::database)
    }

    /// The cached payload, regardless of age. `None` when absent or when the
    /// stored text does not parse (corruption is "no cache").
    pub fn load(&self) -> Option<CombinedPayload> {
        self.load_envelope().map(|envelope| envelope.payload)
    }

    /// True iff a loadable envelope exists and is younger than the TTL.
    pub fn is_fresh(&self) -> bool {
        self.load_envelope().is_some_and(|envelope| {
            let age = self
                .clock
                .now()
                .signed_duration_since(envelope.updated_at);
            age.num_seconds() < CACHE_TTL_SECS
        })
    }

    fn load_envelope(&self) -> Option<CacheEnvelope> {
        let text = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&text).ok()
    }
}
