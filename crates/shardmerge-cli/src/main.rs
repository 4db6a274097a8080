//! shardmerge CLI: the `shardmerge` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr so `--json` stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            shards,
            config,
            strategy,
            strip,
            no_strip,
            validate_first,
            json,
        } => commands::merge::run(commands::merge::Args {
            shards,
            config,
            strategy: strategy.map(Into::into),
            strip: match (strip, no_strip) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            validate_first,
            json,
        }),

        Commands::Validate {
            shards,
            config,
            min_coverage,
            json,
        } => commands::validate::run(shards, config, min_coverage, json),

        Commands::Routing {
            config,
            completed,
            json,
        } => commands::routing::run(config, completed, json),
    }
}
