//! Error types for merge and configuration loading.
//!
//! Validation problems are data (see [`crate::validate`]); only the `error`
//! conflict strategy and unreadable configuration surface as `Err`.

use shardmerge_routing::ShardId;

/// A merge that was halted instead of producing a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Two shards supplied different values for the same record key under
    /// the `error` strategy.
    #[error("conflicting values for key `{key}` from shards {existing_shard} and {incoming_shard}")]
    Conflict {
        key: String,
        existing_shard: ShardId,
        incoming_shard: ShardId,
    },
}

impl MergeError {
    /// The record key the merge stopped on.
    pub fn key(&self) -> &str {
        match self {
            Self::Conflict { key, .. } => key,
        }
    }
}

/// Failure to load an engine configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json at {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
