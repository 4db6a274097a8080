use crate::support::{load_config_or_exit, load_shards_or_exit, print_json_or_exit};
use serde_json::json;
use shardmerge_kernel::{MergeEngine, plan_reruns, render_summary};

pub fn run(shards: String, config: Option<String>, min_coverage: f64, json_output: bool) {
    if !(0.0..=1.0).contains(&min_coverage) {
        eprintln!("error: --min-coverage must be within [0, 1], got {min_coverage}");
        std::process::exit(2);
    }
    let config = load_config_or_exit(config.as_deref());
    let shard_outputs = load_shards_or_exit(&shards);

    let validation = MergeEngine::new(&config.routing, &config.schemas).validate(&shard_outputs);
    let reruns = plan_reruns(&validation, min_coverage);

    if json_output {
        print_json_or_exit(
            &json!({"validation": validation, "reruns": reruns}),
            "validation",
        );
    } else {
        print!("{}", render_summary(&validation));
        if reruns.is_empty() {
            println!("  Reruns: none");
        } else {
            println!("  Reruns:");
            for request in &reruns {
                let reasons: Vec<String> = request.reasons.iter().map(ToString::to_string).collect();
                println!("    - {}: {}", request.shard_id, reasons.join(", "));
            }
        }
        if !validation.contamination.is_empty() {
            println!("  Contamination:");
            for violation in &validation.contamination {
                println!("    - {violation}");
            }
        }
    }

    if !validation.is_valid {
        std::process::exit(1);
    }
}
