//! Routing table documents.
//!
//! A routing table is either an array of shard entries or an object with a
//! `shards` array. Each entry carries `id`, `sources`, `keys` and `priority`.
//! Parsing never fails outright: malformed entries are skipped and reported as
//! issues so a caller can decide whether a partial table is acceptable.

use crate::registry::{RoutingRegistry, ShardRoutingConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ROUTING_TABLE_PATH_PREFIX: &str = "routing";

/// Failure classes attached to routing issues.
pub mod failure_class {
    pub const TABLE_INVALID: &str = "routing_table_invalid";
    pub const ENTRY_INVALID: &str = "routing_entry_invalid";
    pub const DUPLICATE_SHARD: &str = "routing_duplicate_shard";
    pub const KEY_OVERLAP: &str = "routing_key_overlap";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingIssue {
    pub failure_class: String,
    pub path: String,
    pub message: String,
}

impl RoutingIssue {
    pub fn new(failure_class: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure_class: failure_class.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Overlapping keys are legal; every other class means an entry was
    /// dropped or the document was unusable.
    pub fn is_informational(&self) -> bool {
        self.failure_class == failure_class::KEY_OVERLAP
    }
}

/// Parse a routing table document into a registry plus the issues found.
pub fn parse_routing_table(table: &Value) -> (RoutingRegistry, Vec<RoutingIssue>) {
    let mut issues: Vec<RoutingIssue> = Vec::new();

    let entries = match table {
        Value::Array(entries) => entries,
        Value::Object(obj) => match obj.get("shards") {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                issues.push(table_issue("shards", "must be an array"));
                return (RoutingRegistry::default(), issues);
            }
            None => {
                issues.push(table_issue("shards", "missing required array"));
                return (RoutingRegistry::default(), issues);
            }
        },
        _ => {
            issues.push(table_issue("", "must be an array or an object"));
            return (RoutingRegistry::default(), issues);
        }
    };

    let mut configs = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(index, entry) {
            Ok(config) => configs.push((index, config)),
            Err(mut entry_issues) => issues.append(&mut entry_issues),
        }
    }

    let (registry, mut registry_issues) = RoutingRegistry::from_indexed_configs(configs);
    issues.append(&mut registry_issues);
    (registry, issues)
}

fn parse_entry(index: usize, entry: &Value) -> Result<ShardRoutingConfig, Vec<RoutingIssue>> {
    let path = format!("shards[{index}]");
    let Some(entry_obj) = entry.as_object() else {
        return Err(vec![entry_issue(&path, "", "must be an object")]);
    };

    let mut issues = Vec::new();
    let shard_id = non_empty_string(entry_obj.get("id"));
    if shard_id.is_none() {
        issues.push(entry_issue(&path, "id", "must be a non-empty string"));
    }
    let sources = match entry_obj.get("sources") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(value) => string_list(value),
    };
    if sources.is_none() {
        issues.push(entry_issue(
            &path,
            "sources",
            "must be an array of non-empty strings",
        ));
    }
    let keys = entry_obj.get("keys").and_then(string_list);
    if keys.is_none() {
        issues.push(entry_issue(
            &path,
            "keys",
            "must be an array of non-empty strings",
        ));
    }
    let priority = entry_obj
        .get("priority")
        .and_then(Value::as_i64)
        .and_then(|value| i32::try_from(value).ok());
    if priority.is_none() {
        issues.push(entry_issue(&path, "priority", "must be a 32-bit integer"));
    }

    match (shard_id, sources, keys, priority) {
        (Some(shard_id), Some(sources), Some(keys), Some(priority)) if issues.is_empty() => {
            Ok(ShardRoutingConfig::new(shard_id, sources, keys, priority))
        }
        _ => Err(issues),
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| non_empty_string(Some(item)))
        .collect()
}

fn table_issue(field: &str, message: &str) -> RoutingIssue {
    let path = if field.is_empty() {
        ROUTING_TABLE_PATH_PREFIX.to_string()
    } else {
        format!("{ROUTING_TABLE_PATH_PREFIX}.{field}")
    };
    RoutingIssue::new(failure_class::TABLE_INVALID, path, message)
}

fn entry_issue(entry_path: &str, field: &str, message: &str) -> RoutingIssue {
    let path = if field.is_empty() {
        entry_path.to_string()
    } else {
        format!("{entry_path}.{field}")
    };
    RoutingIssue::new(failure_class::ENTRY_INVALID, path, message)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}
