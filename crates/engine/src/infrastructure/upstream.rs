//! Upstream task-data client (GraphQL over HTTP).
//!
//! One POST bundles the four logical queries: the task list, the narrow
//! collector-task objective query, achievements, and hideout stations. The
//! fetch layer is the strict side of the error model: HTTP and GraphQL
//! failures are typed and surfaced, never swallowed. Absent result sections,
//! by contrast, default to empty collections.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use questlog_domain::{Item, Task};

use crate::infrastructure::ports::{CombinedPayload, FetchError, UpstreamPort};

/// Default upstream GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.tarkov.dev/graphql";

/// The well-known task whose objectives define the collector item list.
const COLLECTOR_TASK_ID: &str = "5c51aac186f77432ea65c552";

const COMBINED_QUERY: &str = r#"
{
  tasks {
    id
    name
    minPlayerLevel
    kappaRequired
    lightkeeperRequired
    trader { name imageLink }
    map { id name }
    taskRequirements { task { id name } }
    objectives {
      id
      maps { id name }
      ... on TaskObjectivePlayerLevel { playerLevel }
      ... on TaskObjectiveItem {
        description
        optional
        items { id name iconLink }
      }
      ... on TaskObjectiveBasic { description optional }
    }
    startRewards { items { count item { id name iconLink } } }
    finishRewards { items { count item { id name iconLink } } }
  }
  collectorTask: task(id: "__COLLECTOR_TASK_ID__") {
    objectives {
      ... on TaskObjectiveItem { items { id name iconLink } }
    }
  }
  achievements { id name description hidden }
  hideoutStations {
    id
    name
    levels { level itemRequirements { count item { id name iconLink } } }
  }
}
"#;

/// Client for the combined upstream query.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    url: Url,
}

impl UpstreamClient {
    pub fn new(url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, url }
    }

    fn query_text() -> String {
        COMBINED_QUERY.replace("__COLLECTOR_TASK_ID__", COLLECTOR_TASK_ID)
    }
}

#[async_trait]
impl UpstreamPort for UpstreamClient {
    async fn fetch_combined(&self) -> Result<CombinedPayload, FetchError> {
        // Single best-effort attempt; retry policy belongs to callers.
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "query": Self::query_text() }))
            .send()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        decode_combined(status, &body)
    }
}

/// Decode the combined response body. Pure, so the whole failure surface is
/// testable without a server.
pub(crate) fn decode_combined(status: u16, body: &str) -> Result<CombinedPayload, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::Http(status));
    }

    let response: Value = serde_json::from_str(body)
        .map_err(|err| FetchError::InvalidResponse(err.to_string()))?;

    if let Some(errors) = response.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|entry| entry.get("message").and_then(Value::as_str))
                .collect();
            let message = if messages.is_empty() {
                "unknown GraphQL error".to_string()
            } else {
                messages.join("; ")
            };
            return Err(FetchError::GraphQl(message));
        }
    }

    let empty = Value::Object(serde_json::Map::new());
    let data = response.get("data").unwrap_or(&empty);

    Ok(CombinedPayload {
        tasks: decode_tasks(data.get("tasks")),
        collector_items: decode_collector_items(data.get("collectorTask")),
        achievements: decode_section(data.get("achievements"), "achievement"),
        hideout_stations: decode_section(data.get("hideoutStations"), "hideout station"),
    })
}

fn decode_tasks(section: Option<&Value>) -> Vec<Task> {
    let Some(entries) = section.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let mut record = entry.clone();
            normalize_task(&mut record);
            match serde_json::from_value::<Task>(record) {
                Ok(task) => Some(task),
                Err(err) => {
                    tracing::warn!("skipping malformed task record: {err}");
                    None
                }
            }
        })
        .collect()
}

/// Bring a raw task record into the domain shape:
/// - `taskRequirements` entries arrive as `{task: {id, name}}` and flatten
///   to `{taskId, taskName}`;
/// - `maps` is synthesized as the de-duplicated union of every map
///   referenced by the task's objectives (the primary `map` field is a
///   separate attribute and is left alone).
fn normalize_task(record: &mut Value) {
    let Some(fields) = record.as_object_mut() else {
        return;
    };

    if let Some(requirements) = fields
        .get_mut("taskRequirements")
        .and_then(Value::as_array_mut)
    {
        let flattened: Vec<Value> = requirements
            .iter()
            .filter_map(|entry| {
                if entry.get("taskId").is_some() {
                    return Some(entry.clone());
                }
                let task = entry.get("task")?;
                let id = task.get("id")?.as_str()?;
                let mut reference = serde_json::Map::new();
                reference.insert("taskId".to_string(), Value::String(id.to_string()));
                if let Some(name) = task.get("name").and_then(Value::as_str) {
                    reference.insert("taskName".to_string(), Value::String(name.to_string()));
                }
                Some(Value::Object(reference))
            })
            .collect();
        *requirements = flattened;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut maps: Vec<Value> = Vec::new();
    if let Some(objectives) = fields.get("objectives").and_then(Value::as_array) {
        for objective in objectives {
            let Some(refs) = objective.get("maps").and_then(Value::as_array) else {
                continue;
            };
            for map_ref in refs {
                let Some(id) = map_ref.get("id").and_then(Value::as_str) else {
                    continue;
                };
                if seen.insert(id.to_string()) {
                    maps.push(map_ref.clone());
                }
            }
        }
    }
    fields.insert("maps".to_string(), Value::Array(maps));
}

fn decode_collector_items(section: Option<&Value>) -> Vec<Item> {
    let Some(objectives) = section
        .and_then(|task| task.get("objectives"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();
    for objective in objectives {
        let Some(entries) = objective.get("items").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            match serde_json::from_value::<Item>(entry.clone()) {
                Ok(item) => {
                    if seen.insert(item.id.as_str().to_string()) {
                        items.push(item);
                    }
                }
                Err(err) => {
                    tracing::warn!("skipping malformed collector item: {err}");
                }
            }
        }
    }
    items
}

fn decode_section<T: serde::de::DeserializeOwned>(
    section: Option<&Value>,
    label: &str,
) -> Vec<T> {
    let Some(entries) = section.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("skipping malformed {label} record: {err}");
                None
            }
        })
        .collect()
}
