//! Free-form user preferences.
//!
//! Stored as keyed rows so a save can upsert just the keys it carries,
//! leaving every other key untouched; loading reconstructs the full record
//! and defaults any key with no stored entry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// Show tasks that are already completed in list views.
    pub show_completed: bool,
    /// Show tasks whose prerequisites are not met yet.
    pub show_locked: bool,
    /// Hide everything not required for the collector achievement.
    pub hide_non_kappa: bool,
    /// Primary task view: "all", "maps" or "traders".
    pub task_primary_view: String,
    /// Restrict task views to a single map.
    pub map_filter: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            show_completed: false,
            show_locked: true,
            hide_non_kappa: false,
            task_primary_view: "all".to_string(),
            map_filter: None,
        }
    }
}

impl UserPreferences {
    /// Apply stored key-value rows onto defaults. Unknown keys and values
    /// that fail to parse are skipped.
    pub(crate) fn apply_rows(&mut self, rows: Vec<(String, String)>) {
        for (key, value) in rows {
            match key.as_str() {
                "show_completed" => {
                    if let Ok(v) = value.parse() {
                        self.show_completed = v;
                    }
                }
                "show_locked" => {
                    if let Ok(v) = value.parse() {
                        self.show_locked = v;
                    }
                }
                "hide_non_kappa" => {
                    if let Ok(v) = value.parse() {
                        self.hide_non_kappa = v;
                    }
                }
                "task_primary_view" => self.task_primary_view = value,
                "map_filter" => {
                    self.map_filter = if value.is_empty() { None } else { Some(value) };
                }
                _ => {}
            }
        }
    }

    /// Every preference as a key-value pair (used by full imports).
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("show_completed".to_string(), self.show_completed.to_string()),
            ("show_locked".to_string(), self.show_locked.to_string()),
            ("hide_non_kappa".to_string(), self.hide_non_kappa.to_string()),
            (
                "task_primary_view".to_string(),
                self.task_primary_view.clone(),
            ),
            (
                "map_filter".to_string(),
                self.map_filter.clone().unwrap_or_default(),
            ),
        ]
    }
}

/// A partial preferences write: only `Some` fields are persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesUpdate {
    pub show_completed: Option<bool>,
    pub show_locked: Option<bool>,
    pub hide_non_kappa: Option<bool>,
    pub task_primary_view: Option<String>,
    /// `Some(None)` clears the filter; `None` leaves it untouched.
    pub map_filter: Option<Option<String>>,
}

impl PreferencesUpdate {
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.show_completed {
            pairs.push(("show_completed".to_string(), v.to_string()));
        }
        if let Some(v) = self.show_locked {
            pairs.push(("show_locked".to_string(), v.to_string()));
        }
        if let Some(v) = self.hide_non_kappa {
            pairs.push(("hide_non_kappa".to_string(), v.to_string()));
        }
        if let Some(v) = &self.task_primary_view {
            pairs.push(("task_primary_view".to_string(), v.clone()));
        }
        if let Some(v) = &self.map_filter {
            pairs.push(("map_filter".to_string(), v.clone().unwrap_or_default()));
        }
        pairs
    }
}
