//! # Shardmerge Kernel
//!
//! Combines the outputs of independent extraction shards into one canonical
//! record. Each shard owns a set of top-level record keys (its routing
//! entry); the kernel validates every payload against that ownership,
//! reports contamination and cross-shard conflicts, and merges the payloads
//! deterministically under a chosen conflict strategy.
//!
//! This crate is **schema-agnostic**: shard payloads are plain JSON trees and
//! the structural checks are delegated to a [`StructuralValidator`].
//!
//! ## Architecture
//!
//! ```text
//! RoutingRegistry        ← shard → {sources, authorized keys, priority}
//!     │
//! StructuralValidator    ← shape check per shard (ShapeSchemas by default)
//!     │
//! ShardValidator         ← errors, warnings, coverage, contamination
//!     │
//! detect_conflicts       ← leaf paths two shards disagree on
//!     │
//! MergeEngine            ← priority-ordered key merge → CanonicalRecord
//!     │
//! plan_reruns            ← which shards to re-request
//! ```

pub mod config;
pub mod conflict;
pub mod contamination;
pub mod digest;
pub mod error;
pub mod merge;
pub mod repair;
pub mod report;
pub mod schema;
pub mod strategy;
pub mod validate;

use serde_json::Value;
use std::collections::BTreeMap;

pub use config::EngineConfig;
pub use conflict::{ShardConflict, UNRESOLVED, detect_conflicts, flatten, values_equal};
pub use contamination::{detect_contamination, sanitize};
pub use digest::{record_digest, value_digest};
pub use error::{ConfigError, MergeError};
pub use merge::{MergeEngine, MergeOutcome, deep_merge};
pub use repair::{RerunReason, RerunRequest, plan_reruns};
pub use report::render_summary;
pub use schema::{SchemaViolation, ShapeSchema, ShapeSchemas, StructuralValidator, ValueKind};
pub use shardmerge_routing::{
    RoutingIssue, RoutingRegistry, ShardId, ShardRoutingConfig, default_routing_registry,
    failure_class, parse_routing_table,
};
pub use strategy::{ConflictResolution, MergeOptions};
pub use validate::{MergeValidationResult, ShardValidationResult, ShardValidator, coverage_of};

/// Shard payloads keyed by shard id.
pub type ShardOutputs = BTreeMap<ShardId, Value>;

/// The merged record: top-level keys to values.
pub type CanonicalRecord = serde_json::Map<String, Value>;
