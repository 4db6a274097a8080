use crate::support::{load_config_or_exit, print_json_or_exit};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutingRow {
    shard_id: String,
    priority: i32,
    required_sources: Vec<String>,
    authorized_keys: Vec<String>,
    ready: bool,
}

pub fn run(config: Option<String>, completed: Vec<String>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let completed: BTreeSet<String> = completed.into_iter().collect();

    let rows: Vec<RoutingRow> = config
        .routing
        .ordered_by_priority()
        .into_iter()
        .filter_map(|shard_id| {
            let entry = config.routing.lookup(shard_id.as_str())?;
            Some(RoutingRow {
                ready: config.routing.ready(shard_id.as_str(), &completed),
                shard_id: shard_id.0,
                priority: entry.priority,
                required_sources: entry.required_sources.clone(),
                authorized_keys: entry.authorized_keys.clone(),
            })
        })
        .collect();
    let overlaps = config.routing.overlapping_keys();

    if json_output {
        print_json_or_exit(
            &serde_json::json!({
                "shards": rows,
                "completedSources": completed,
                "overlappingKeys": overlaps,
                "issues": config.issues,
            }),
            "routing",
        );
        return;
    }

    println!("shardmerge routing");
    println!("  Shards: {}", rows.len());
    for row in &rows {
        let marker = if row.ready { "ready" } else { "waiting" };
        println!(
            "    {}. {} [{}] keys: {}",
            row.priority,
            row.shard_id,
            marker,
            row.authorized_keys.join(", ")
        );
        if !row.ready {
            let missing: Vec<&str> = row
                .required_sources
                .iter()
                .filter(|source| !completed.contains(*source))
                .map(String::as_str)
                .collect();
            println!("       missing: {}", missing.join(", "));
        }
    }
    if !overlaps.is_empty() {
        println!("  Overlapping keys:");
        for (key, owners) in &overlaps {
            let owners: Vec<&str> = owners.iter().map(|id| id.as_str()).collect();
            println!("    - {key}: {}", owners.join(", "));
        }
    }
}
