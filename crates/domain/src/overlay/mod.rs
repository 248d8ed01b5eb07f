//! The community correction document ("overlay") and its merge rules.
//!
//! Upstream task data is authoritative but imperfect; the overlay is a
//! versioned patch document, keyed by task id, that corrects or extends
//! individual records. Application is pure: same `(task, overlay)` in, same
//! record out, with no partial application of any single field.

mod merge;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::TaskId;

pub use merge::{apply_overlay, COLLECTOR_MARKER};

/// The whole correction document: one optional patch per task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default)]
    pub tasks: HashMap<TaskId, TaskPatch>,
    #[serde(rename = "$meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<OverlayMeta>,
}

impl Overlay {
    pub fn from_json(text: &str) -> Result<Self, OverlayParseError> {
        serde_json::from_str(text).map_err(|err| OverlayParseError(err.to_string()))
    }

    pub fn patch_for(&self, id: &TaskId) -> Option<&TaskPatch> {
        self.tasks.get(id)
    }
}

/// Document-level metadata; describes the whole overlay, not one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMeta {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("overlay document is not valid JSON: {0}")]
pub struct OverlayParseError(String);

/// A single task's patch: a bag of field overrides interpreted by the
/// merge-strategy table, plus the two objective-level patch surfaces
/// (`objectives`, `objectivesAdd`) and the `disabled` tombstone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPatch(pub Map<String, Value>);

impl TaskPatch {
    /// Exclusion tombstone: the task is removed from the merged set.
    pub fn disabled(&self) -> bool {
        matches!(self.0.get("disabled"), Some(Value::Bool(true)))
    }

    /// Patches for existing objectives, keyed by objective id.
    pub(crate) fn objective_patches(&self) -> Option<&Map<String, Value>> {
        self.0.get("objectives")?.as_object()
    }

    /// Wholly new objective records to append.
    pub(crate) fn objectives_add(&self) -> Option<&Vec<Value>> {
        self.0.get("objectivesAdd")?.as_array()
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}
