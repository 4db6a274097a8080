//! Field-path conflicts between shards.
//!
//! Every payload is flattened into dotted paths. Objects are descended into;
//! lists and primitives are leaves, so a list is compared as a whole and
//! never split into indexed paths. A path that two or more shards fill with
//! values that are not all equal is a conflict.

use crate::ShardOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shardmerge_routing::{RoutingRegistry, ShardId};
use std::collections::BTreeMap;

/// Resolution tag carried by conflicts found during validation.
pub const UNRESOLVED: &str = "unresolved";

/// Two shards disagreeing about one field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardConflict {
    pub path: String,
    pub shard_a: ShardId,
    pub shard_b: ShardId,
    pub value_a: Value,
    pub value_b: Value,
    pub resolution: String,

    /// Contributors after the first two, in encounter order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_contributed_by: Vec<ShardId>,
}

/// Flatten an object payload into `(dotted path, leaf)` pairs.
///
/// Non-object payloads have no addressable paths.
pub fn flatten(output: &Value) -> Vec<(String, &Value)> {
    let mut leaves = Vec::new();
    if let Some(sections) = output.as_object() {
        flatten_into(sections, "", &mut leaves);
    }
    leaves
}

fn flatten_into<'v>(map: &'v Map<String, Value>, prefix: &str, out: &mut Vec<(String, &'v Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(child) => flatten_into(child, &path, out),
            leaf => out.push((path, leaf)),
        }
    }
}

/// Structural equality over payload trees.
///
/// Numbers compare by value, so `100` and `100.0` are equal. Object key
/// order never matters; list order does.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Find conflicting field paths across all shards.
///
/// Shards are encountered in processing order (priority, then declaration,
/// unknown ids last), so `shard_a` is always the higher precedence side.
/// Conflicts come out sorted by path.
pub fn detect_conflicts(routing: &RoutingRegistry, shard_outputs: &ShardOutputs) -> Vec<ShardConflict> {
    let mut index: BTreeMap<String, Vec<(&ShardId, &Value)>> = BTreeMap::new();
    for shard_id in routing.order_shards(shard_outputs.keys()) {
        let Some(output) = shard_outputs.get(shard_id) else {
            continue;
        };
        for (path, value) in flatten(output) {
            index.entry(path).or_default().push((shard_id, value));
        }
    }

    index
        .into_iter()
        .filter_map(|(path, contributions)| {
            let [(shard_a, value_a), (shard_b, value_b), rest @ ..] = contributions.as_slice()
            else {
                return None;
            };
            let first = *value_a;
            if contributions.iter().all(|(_, value)| values_equal(value, first)) {
                return None;
            }
            Some(ShardConflict {
                path,
                shard_a: (*shard_a).clone(),
                shard_b: (*shard_b).clone(),
                value_a: (*value_a).clone(),
                value_b: (*value_b).clone(),
                resolution: UNRESOLVED.to_string(),
                also_contributed_by: rest.iter().map(|(shard, _)| (*shard).clone()).collect(),
            })
        })
        .collect()
}
