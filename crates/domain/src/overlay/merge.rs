//! Field-by-field application of a task patch onto a task record.
//!
//! The merge works on the wire representation (`serde_json::Value`) so that
//! fields this crate does not model obey the same rules as the ones it does.
//! Every field merges through one of three strategies looked up in
//! `strategy_for`; a patch value the record schema cannot absorb is dropped
//! whole, never half-applied.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::entities::Task;
use crate::overlay::{Overlay, TaskPatch};

/// Literal marker in an added objective's description that triggers the
/// one-objective-per-item fan-out.
pub const COLLECTOR_MARKER: &str = "Collector items";

const ICON_URL_BASE: &str = "https://assets.tarkov.dev";

/// Key used to de-duplicate prerequisite references.
const REQUIREMENT_KEY: &[&str] = &["taskId"];
/// Key used to de-duplicate reward item grants.
const REWARD_ITEM_KEY: &[&str] = &["item", "id"];

/// How a patched field merges onto the task record.
enum MergeStrategy {
    /// Patch value wins wholesale.
    Replace,
    /// Append-only union of an array of objects, keyed by a nested id.
    /// Existing entries come first; unseen patch entries follow in patch
    /// order.
    UnionByKey { key_path: &'static [&'static str] },
    /// A `{ items: [...] }` reward block: items union by the nested item id,
    /// sibling keys shallow-overwritten by the patch.
    RewardItemsUnion,
}

fn strategy_for(field: &str) -> MergeStrategy {
    match field {
        "taskRequirements" => MergeStrategy::UnionByKey {
            key_path: REQUIREMENT_KEY,
        },
        "startRewards" | "finishRewards" => MergeStrategy::RewardItemsUnion,
        _ => MergeStrategy::Replace,
    }
}

/// Apply the overlay's patch for `task`, if any.
///
/// Returns `None` when the patch disables the task; callers must filter
/// these out before the record can reach graph building or any view. Pure:
/// identical inputs always produce identical output.
pub fn apply_overlay(task: &Task, overlay: &Overlay) -> Option<Task> {
    let Some(patch) = overlay.patch_for(&task.id) else {
        return Some(task.clone());
    };
    if patch.disabled() {
        return None;
    }

    let mut record = match serde_json::to_value(task) {
        Ok(Value::Object(map)) => map,
        _ => return Some(task.clone()),
    };

    for (field, value) in patch.fields() {
        if matches!(field.as_str(), "disabled" | "objectives" | "objectivesAdd") {
            continue;
        }
        apply_field(&mut record, field, value);
    }

    apply_objective_patches(&mut record, patch);
    append_added_objectives(&mut record, patch);
    backfill_icon_links(&mut record);

    match serde_json::from_value(Value::Object(record)) {
        Ok(merged) => Some(merged),
        // The patch broke the record schema in a way the per-field guard
        // could not see; keep the upstream record.
        Err(_) => Some(task.clone()),
    }
}

fn apply_field(record: &mut Map<String, Value>, field: &str, patch_value: &Value) {
    let merged = match strategy_for(field) {
        MergeStrategy::Replace => patch_value.clone(),
        MergeStrategy::UnionByKey { key_path } => {
            match union_by_key(record.get(field), patch_value, key_path) {
                Some(value) => value,
                None => return,
            }
        }
        MergeStrategy::RewardItemsUnion => {
            match merge_reward_block(record.get(field), patch_value) {
                Some(value) => value,
                None => return,
            }
        }
    };

    let mut candidate = record.clone();
    candidate.insert(field.to_string(), merged);
    if types_as_task(&candidate) {
        *record = candidate;
    }
}

/// Union of two arrays of objects, keyed by `key_path`. Existing entries are
/// kept verbatim and come first; patch entries follow in patch order, minus
/// any whose key is already present. Patch entries without the key cannot be
/// de-duplicated and are skipped. `None` when the patch value is not an
/// array.
fn union_by_key(
    existing: Option<&Value>,
    patch: &Value,
    key_path: &[&str],
) -> Option<Value> {
    let patch_entries = patch.as_array()?;
    let mut merged: Vec<Value> = existing
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut seen: HashSet<String> = merged
        .iter()
        .filter_map(|entry| entry_key(entry, key_path))
        .collect();

    for entry in patch_entries {
        if let Some(key) = entry_key(entry, key_path) {
            if seen.insert(key) {
                merged.push(entry.clone());
            }
        }
    }

    Some(Value::Array(merged))
}

fn entry_key(entry: &Value, key_path: &[&str]) -> Option<String> {
    let mut current = entry;
    for segment in key_path {
        current = current.get(segment)?;
    }
    current.as_str().map(str::to_owned)
}

/// Reward blocks are `{ items: [...] }` plus whatever siblings upstream
/// attaches. Items union by the nested item id; every other patch key
/// shallow-overwrites. `None` when the patch value is not an object or its
/// `items` is not an array.
fn merge_reward_block(existing: Option<&Value>, patch: &Value) -> Option<Value> {
    let patch_fields = patch.as_object()?;
    let mut merged: Map<String, Value> = existing
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for (key, value) in patch_fields {
        if key == "items" {
            let items = union_by_key(merged.get("items"), value, REWARD_ITEM_KEY)?;
            merged.insert("items".to_string(), items);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }

    Some(Value::Object(merged))
}

/// Shallow-merge patch fields onto existing objectives that carry a matching
/// id. Objectives without an id, or without a patch entry, pass through.
fn apply_objective_patches(record: &mut Map<String, Value>, patch: &TaskPatch) {
    let Some(patches) = patch.objective_patches() else {
        return;
    };
    let Some(objectives) = record.get_mut("objectives").and_then(Value::as_array_mut) else {
        return;
    };

    for objective in objectives.iter_mut() {
        let Some(fields) = objective.as_object_mut() else {
            continue;
        };
        let Some(id) = fields.get("id").and_then(Value::as_str).map(str::to_owned) else {
            continue;
        };
        let Some(Value::Object(patch_fields)) = patches.get(&id) else {
            continue;
        };
        for (key, value) in patch_fields {
            fields.insert(key.clone(), value.clone());
        }
    }
}

/// Append `objectivesAdd` records after the existing objectives, expanding
/// multi-item "Collector items" entries into one objective per item.
fn append_added_objectives(record: &mut Map<String, Value>, patch: &TaskPatch) {
    let Some(additions) = patch.objectives_add() else {
        return;
    };
    if additions.is_empty() {
        return;
    }

    let objectives = record
        .entry("objectives".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(list) = objectives.as_array_mut() else {
        return;
    };

    for added in additions {
        list.extend(expand_added_objective(added));
    }
}

fn expand_added_objective(objective: &Value) -> Vec<Value> {
    let Some(fields) = objective.as_object() else {
        return vec![objective.clone()];
    };
    let description = fields
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(items) = fields.get("items").and_then(Value::as_array) else {
        return vec![objective.clone()];
    };
    if items.len() <= 1 || !description.contains(COLLECTOR_MARKER) {
        return vec![objective.clone()];
    }

    items
        .iter()
        .map(|item| {
            let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
            let mut single = fields.clone();
            single.insert(
                "description".to_string(),
                Value::String(handover_description(name)),
            );
            single.insert("items".to_string(), Value::Array(vec![item.clone()]));
            Value::Object(single)
        })
        .collect()
}

fn handover_description(item_name: &str) -> String {
    format!("Hand over the found in raid item: {item_name}")
}

/// Give every objective item with an id but no icon reference a
/// deterministic icon URL. Runs last so freshly-added and expanded items are
/// covered too.
fn backfill_icon_links(record: &mut Map<String, Value>) {
    let Some(objectives) = record.get_mut("objectives").and_then(Value::as_array_mut) else {
        return;
    };

    for objective in objectives {
        let Some(items) = objective.get_mut("items").and_then(Value::as_array_mut) else {
            continue;
        };
        for item in items {
            let Some(fields) = item.as_object_mut() else {
                continue;
            };
            if fields.get("iconLink").is_some_and(|link| !link.is_null()) {
                continue;
            }
            let Some(id) = fields.get("id").and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };
            fields.insert("iconLink".to_string(), Value::String(icon_link_for(&id)));
        }
    }
}

fn icon_link_for(item_id: &str) -> String {
    format!("{ICON_URL_BASE}/{item_id}-icon.webp")
}

fn types_as_task(record: &Map<String, Value>) -> bool {
    serde_json::from_value::<Task>(Value::Object(record.clone())).is_ok()
}
