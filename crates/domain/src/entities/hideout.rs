use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::Item;
use crate::ids::StationId;

/// A hideout station and its upgrade levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HideoutStation {
    pub id: StationId,
    pub name: String,
    #[serde(default)]
    pub levels: Vec<StationLevel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationLevel {
    pub level: u32,
    #[serde(default)]
    pub item_requirements: Vec<StationItemRequirement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationItemRequirement {
    pub item: Item,
    #[serde(default = "default_requirement_count")]
    pub count: u32,
}

fn default_requirement_count() -> u32 {
    1
}
