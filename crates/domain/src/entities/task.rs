//! Task records as delivered by the upstream API.
//!
//! A task is a unit of progress: an id, the tasks it requires, optional
//! objectives, and rewards. Prerequisite references may dangle (point at an
//! id with no task in the same set); consumers treat those as "no such
//! task", never as an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::Item;
use crate::ids::{MapId, ObjectiveId, TaskId};

/// A single quest definition.
///
/// Field names mirror the upstream wire format. Unknown fields end up in
/// `extra` so corrections touching fields this crate does not model survive
/// the merge round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub min_player_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader: Option<Trader>,
    /// Primary map, as assigned upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapRef>,
    /// Every map referenced by this task's objectives, de-duplicated.
    /// Synthesized by the fetch layer, not queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<Vec<MapRef>>,
    #[serde(default)]
    pub task_requirements: Vec<TaskRequirement>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_rewards: Option<Rewards>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_rewards: Option<Rewards>,
    #[serde(default)]
    pub kappa_required: bool,
    #[serde(default)]
    pub lightkeeper_required: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Direct prerequisite ids, in requirement order.
    pub fn prerequisite_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.task_requirements.iter().map(|req| &req.task_id)
    }
}

/// A reference to a prerequisite task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequirement {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
}

/// The trader who gives out a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
}

/// A map reference as it appears on tasks and objectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRef {
    pub id: MapId,
    pub name: String,
}

/// One objective of a task.
///
/// Objective records are heterogeneous on the wire. The two shapes the core
/// interprets are modeled; anything else passes through `Other` untouched so
/// the merge layer never drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Objective {
    /// "Reach player level N".
    PlayerLevel(PlayerLevelObjective),
    /// Anything with a human-readable description, optionally requiring items.
    Standard(StandardObjective),
    /// Shapes this crate does not model.
    Other(Value),
}

impl Objective {
    pub fn id(&self) -> Option<&ObjectiveId> {
        match self {
            Objective::PlayerLevel(objective) => objective.id.as_ref(),
            Objective::Standard(objective) => objective.id.as_ref(),
            Objective::Other(_) => None,
        }
    }

    pub fn maps(&self) -> &[MapRef] {
        match self {
            Objective::PlayerLevel(objective) => &objective.maps,
            Objective::Standard(objective) => &objective.maps,
            Objective::Other(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLevelObjective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectiveId>,
    pub player_level: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maps: Vec<MapRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardObjective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectiveId>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maps: Vec<MapRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reward block: a list of item grants plus whatever else upstream attaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rewards {
    #[serde(default)]
    pub items: Vec<RewardItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardItem {
    pub item: Item,
    #[serde(default = "default_reward_count")]
    pub count: u32,
}

fn default_reward_count() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objective_decodes_player_level_shape() {
        let objective: Objective = serde_json::from_value(json!({
            "id": "obj-1",
            "playerLevel": 15
        }))
        .expect("decode");

        match objective {
            Objective::PlayerLevel(level) => assert_eq!(level.player_level, 15),
            other => panic!("expected player-level objective, got {other:?}"),
        }
    }

    #[test]
    fn objective_decodes_standard_shape_with_items() {
        let objective: Objective = serde_json::from_value(json!({
            "id": "obj-2",
            "description": "Hand over the item",
            "items": [{"id": "item-1", "name": "Salewa"}],
            "maps": [{"id": "map-1", "name": "Customs"}]
        }))
        .expect("decode");

        match objective {
            Objective::Standard(standard) => {
                assert_eq!(standard.description, "Hand over the item");
                assert_eq!(standard.items.map(|items| items.len()), Some(1));
                assert_eq!(standard.maps.len(), 1);
            }
            other => panic!("expected standard objective, got {other:?}"),
        }
    }

    #[test]
    fn objective_without_description_falls_through_to_other() {
        let objective: Objective = serde_json::from_value(json!({
            "kind": "experimental",
            "payload": {"x": 1}
        }))
        .expect("decode");

        assert!(matches!(objective, Objective::Other(_)));
    }

    #[test]
    fn task_round_trips_unknown_fields() {
        let raw = json!({
            "id": "task-1",
            "name": "Debut",
            "minPlayerLevel": 1,
            "factionName": "Any",
            "experience": 1700
        });

        let task: Task = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(task.extra.get("experience"), Some(&json!(1700)));

        let encoded = serde_json::to_value(&task).expect("encode");
        assert_eq!(encoded.get("factionName"), Some(&json!("Any")));
    }
}
