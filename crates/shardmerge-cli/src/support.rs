use serde::Serialize;
use serde_json::Value;
use shardmerge_kernel::{EngineConfig, ShardId, ShardOutputs};
use std::path::Path;
use tracing::warn;

/// Load the engine configuration, or the built-in defaults when no path is
/// given. Routing issues are logged; dropped entries stay dropped.
pub fn load_config_or_exit(config: Option<&str>) -> EngineConfig {
    let Some(path) = config else {
        return EngineConfig::default();
    };
    let config = EngineConfig::load(path).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    for issue in &config.issues {
        warn!(
            failure_class = %issue.failure_class,
            path = %issue.path,
            "{}",
            issue.message
        );
    }
    config
}

/// Read a JSON object mapping shard id to shard output.
pub fn load_shards_or_exit(path: &str) -> ShardOutputs {
    let text = std::fs::read_to_string(Path::new(path)).unwrap_or_else(|err| {
        eprintln!("error: failed to read {path}: {err}");
        std::process::exit(2);
    });
    let document: Value = serde_json::from_str(&text).unwrap_or_else(|err| {
        eprintln!("error: invalid json at {path}: {err}");
        std::process::exit(2);
    });
    let Value::Object(entries) = document else {
        eprintln!("error: {path}: expected an object mapping shard id to output");
        std::process::exit(2);
    };
    entries
        .into_iter()
        .map(|(shard_id, output)| (ShardId::new(shard_id), output))
        .collect()
}

pub fn print_json_or_exit<T: Serialize>(payload: &T, label: &str) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|err| {
        eprintln!("error: failed to render {label} JSON: {err}");
        std::process::exit(2);
    });
    println!("{rendered}");
}
