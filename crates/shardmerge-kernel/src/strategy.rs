//! Conflict resolution strategies and merge options.
//!
//! The strategy decides what happens when a shard supplies a value for a
//! record key that an earlier (higher precedence) shard already filled:
//!
//! - **priority**: the earlier value stays
//! - **latest**: the later value replaces it
//! - **merge**: objects are deep-merged, lists concatenated
//! - **error**: the merge halts on the first disagreement

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Earliest processed value wins and is never overwritten.
    #[default]
    Priority,

    /// Every later contributor overwrites.
    Latest,

    /// Recursive deep merge of objects.
    ///
    /// Incoming fields win on primitive collisions, new fields union in,
    /// lists concatenate in processing order, and a null side yields the
    /// other side.
    Merge,

    /// Halt on the first key two shards disagree about.
    Error,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Priority => write!(f, "priority"),
            Self::Latest => write!(f, "latest"),
            Self::Merge => write!(f, "merge"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "latest" => Ok(Self::Latest),
            "merge" | "deep_merge" => Ok(Self::Merge),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown conflict resolution strategy: {s}")),
        }
    }
}

/// Options for one merge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeOptions {
    pub conflict_resolution: ConflictResolution,

    /// Validate every shard before merging. Combined with
    /// [`ConflictResolution::Error`], any invalid shard stops the call with
    /// an empty record.
    pub validate_before_merge: bool,

    /// Drop keys outside each shard's authorized set before merging.
    pub strip_unauthorized_keys: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::Priority,
            validate_before_merge: false,
            strip_unauthorized_keys: true,
        }
    }
}

impl MergeOptions {
    pub fn with_strategy(conflict_resolution: ConflictResolution) -> Self {
        Self {
            conflict_resolution,
            ..Self::default()
        }
    }
}
