use crate::support::{load_config_or_exit, load_shards_or_exit, print_json_or_exit};
use serde_json::json;
use shardmerge_kernel::{ConflictResolution, MergeEngine, MergeOutcome, render_summary};

pub struct Args {
    pub shards: String,
    pub config: Option<String>,
    pub strategy: Option<ConflictResolution>,
    pub strip: Option<bool>,
    pub validate_first: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let config = load_config_or_exit(args.config.as_deref());
    let shard_outputs = load_shards_or_exit(&args.shards);

    let mut options = config.merge;
    if let Some(strategy) = args.strategy {
        options.conflict_resolution = strategy;
    }
    if let Some(strip) = args.strip {
        options.strip_unauthorized_keys = strip;
    }
    options.validate_before_merge |= args.validate_first;

    let engine = MergeEngine::new(&config.routing, &config.schemas);
    let outcome = engine.merge(&shard_outputs, &options).unwrap_or_else(|err| {
        if args.json {
            print_json_or_exit(
                &json!({"error": err.to_string(), "key": err.key()}),
                "merge error",
            );
        }
        eprintln!("error: merge halted: {err}");
        std::process::exit(2);
    });

    if args.json {
        print_json_or_exit(&outcome, "merge outcome");
    } else {
        print_human_summary(&outcome, options.conflict_resolution);
    }

    if outcome.short_circuited {
        std::process::exit(2);
    }
    if !outcome.validation.is_valid {
        std::process::exit(1);
    }
}

fn print_human_summary(outcome: &MergeOutcome, strategy: ConflictResolution) {
    println!("shardmerge merge");
    println!("  Strategy: {strategy}");
    if outcome.short_circuited {
        println!("  Result: halted (invalid shards under error strategy)");
    } else {
        println!("  Keys: {}", outcome.data.len());
        for (key, shards) in &outcome.sources {
            let shards: Vec<&str> = shards.iter().map(|id| id.as_str()).collect();
            println!("    - {key} <- {}", shards.join(", "));
        }
        println!("  Digest: {}", outcome.digest);
    }
    print!("{}", render_summary(&outcome.validation));
}
