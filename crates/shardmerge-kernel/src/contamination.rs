//! Unauthorized top-level keys ("contamination").
//!
//! A shard may only write the keys its routing entry authorizes. Anything
//! else at the top level of its payload is reported here and, when the merge
//! asks for it, removed from a copy of the payload.

use serde_json::{Map, Value};
use shardmerge_routing::{RoutingRegistry, ShardId};

/// Report every top-level key of `output` outside `shard_id`'s authorized
/// set. Unknown shards and non-object payloads report nothing.
pub fn detect_contamination(
    routing: &RoutingRegistry,
    shard_id: &ShardId,
    output: &Value,
) -> Vec<String> {
    let Some(config) = routing.lookup(shard_id.as_str()) else {
        return Vec::new();
    };
    let Some(sections) = output.as_object() else {
        return Vec::new();
    };
    sections
        .keys()
        .filter(|key| !config.authorizes(key))
        .map(|key| format!("Shard \"{shard_id}\" contains unauthorized key: \"{key}\""))
        .collect()
}

/// A copy of `output` holding only `shard_id`'s authorized keys.
///
/// Returns `None` when nothing would be removed.
pub fn sanitize(routing: &RoutingRegistry, shard_id: &ShardId, output: &Value) -> Option<Value> {
    let config = routing.lookup(shard_id.as_str())?;
    let sections = output.as_object()?;
    if sections.keys().all(|key| config.authorizes(key)) {
        return None;
    }
    let kept: Map<String, Value> = sections
        .iter()
        .filter(|(key, _)| config.authorizes(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(Value::Object(kept))
}
