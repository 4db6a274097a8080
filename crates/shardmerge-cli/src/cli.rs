use clap::{Parser, Subcommand, ValueEnum};
use shardmerge_kernel::ConflictResolution;

#[derive(Parser)]
#[command(
    name = "shardmerge",
    about = "shardmerge: validate and merge extraction shards into one canonical record",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge shard outputs into one canonical record
    Merge {
        /// JSON object mapping shard id to shard output
        #[arg(long)]
        shards: String,

        /// Engine configuration (TOML or JSON); built-in routing when omitted
        #[arg(long)]
        config: Option<String>,

        /// Conflict resolution strategy (overrides configuration)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Strip unauthorized keys before merging
        #[arg(long, conflicts_with = "no_strip")]
        strip: bool,

        /// Keep unauthorized keys in the working copy
        #[arg(long)]
        no_strip: bool,

        /// Validate every shard before merging
        #[arg(long)]
        validate_first: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate shard outputs and plan reruns without merging
    Validate {
        /// JSON object mapping shard id to shard output
        #[arg(long)]
        shards: String,

        /// Engine configuration (TOML or JSON); built-in routing when omitted
        #[arg(long)]
        config: Option<String>,

        /// Shards below this coverage are planned for rerun
        #[arg(long, default_value_t = 0.5)]
        min_coverage: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show processing order and shard readiness
    Routing {
        /// Engine configuration (TOML or JSON); built-in routing when omitted
        #[arg(long)]
        config: Option<String>,

        /// Upstream sources that have completed (repeatable)
        #[arg(long = "completed")]
        completed: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Priority,
    Latest,
    Merge,
    Error,
}

impl From<StrategyArg> for ConflictResolution {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Priority => Self::Priority,
            StrategyArg::Latest => Self::Latest,
            StrategyArg::Merge => Self::Merge,
            StrategyArg::Error => Self::Error,
        }
    }
}
