//! Per-shard validation and coverage.
//!
//! Validation never fails: unknown shards, structural violations and
//! conflicts are all reported as data in [`MergeValidationResult`].

use crate::ShardOutputs;
use crate::conflict::{ShardConflict, detect_conflicts};
use crate::contamination::detect_contamination;
use crate::schema::StructuralValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shardmerge_routing::{RoutingRegistry, ShardId, ShardRoutingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardValidationResult {
    pub shard_id: ShardId,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Fraction of authorized keys that are populated, in `[0, 1]`.
    pub coverage: f64,
}

impl ShardValidationResult {
    fn invalid(shard_id: &ShardId, errors: Vec<String>) -> Self {
        Self {
            shard_id: shard_id.clone(),
            is_valid: false,
            errors,
            warnings: Vec::new(),
            coverage: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeValidationResult {
    /// No shard errors and no conflicts.
    pub is_valid: bool,
    pub shard_results: Vec<ShardValidationResult>,
    pub conflicts: Vec<ShardConflict>,
    /// Mean of per-shard coverage; zero when there are no shards.
    pub overall_coverage: f64,
    /// Unauthorized keys found across all shards. Does not affect validity.
    #[serde(default)]
    pub contamination: Vec<String>,
}

/// Validates shard payloads against routing and structure.
#[derive(Clone, Copy)]
pub struct ShardValidator<'a> {
    routing: &'a RoutingRegistry,
    structure: &'a dyn StructuralValidator,
}

impl<'a> ShardValidator<'a> {
    pub fn new(routing: &'a RoutingRegistry, structure: &'a dyn StructuralValidator) -> Self {
        Self { routing, structure }
    }

    /// Validate one shard payload.
    pub fn validate(&self, shard_id: &ShardId, output: &Value) -> ShardValidationResult {
        let Some(config) = self.routing.lookup(shard_id.as_str()) else {
            return ShardValidationResult::invalid(shard_id, vec![format!("Unknown shard: {shard_id}")]);
        };

        if let Err(violations) = self.structure.check(shard_id, output) {
            let errors = violations.iter().map(ToString::to_string).collect();
            return ShardValidationResult::invalid(shard_id, errors);
        }

        let (coverage, warnings) = coverage_of(config, output);
        ShardValidationResult {
            shard_id: shard_id.clone(),
            is_valid: true,
            errors: Vec::new(),
            warnings,
            coverage,
        }
    }

    /// Validate every shard, detect conflicts and collect contamination.
    ///
    /// Shard results follow processing order.
    pub fn validate_all(&self, shard_outputs: &ShardOutputs) -> MergeValidationResult {
        let order = self.routing.order_shards(shard_outputs.keys());
        let mut shard_results = Vec::with_capacity(order.len());
        let mut contamination = Vec::new();
        for shard_id in order {
            let Some(output) = shard_outputs.get(shard_id) else {
                continue;
            };
            shard_results.push(self.validate(shard_id, output));
            contamination.extend(detect_contamination(self.routing, shard_id, output));
        }

        let conflicts = detect_conflicts(self.routing, shard_outputs);
        let overall_coverage = if shard_results.is_empty() {
            0.0
        } else {
            shard_results.iter().map(|result| result.coverage).sum::<f64>()
                / shard_results.len() as f64
        };
        let is_valid = conflicts.is_empty() && shard_results.iter().all(|result| result.is_valid);

        MergeValidationResult {
            is_valid,
            shard_results,
            conflicts,
            overall_coverage,
            contamination,
        }
    }
}

/// Coverage of a structurally valid payload over its authorized keys.
///
/// A key is populated when present, non-null and, for objects, non-empty.
/// Empty lists count as populated. A shard with no authorized keys has full
/// coverage.
pub fn coverage_of(config: &ShardRoutingConfig, output: &Value) -> (f64, Vec<String>) {
    let mut warnings = Vec::new();
    let mut populated = 0usize;
    for key in &config.authorized_keys {
        match output.get(key.as_str()) {
            None | Some(Value::Null) => {
                warnings.push(format!("Missing required section: {key}"));
            }
            Some(Value::Object(fields)) if fields.is_empty() => {
                warnings.push(format!("Empty section: {key}"));
            }
            Some(_) => populated += 1,
        }
    }

    let total = config.authorized_keys.len();
    let coverage = if total == 0 {
        1.0
    } else {
        populated as f64 / total as f64
    };
    (coverage, warnings)
}
