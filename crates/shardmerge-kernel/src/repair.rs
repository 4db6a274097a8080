//! Rerun planning for an external repair loop.
//!
//! A shard is worth re-requesting when it failed validation, covered too
//! little of its authorized keys, or disagreed with another shard.

use crate::validate::MergeValidationResult;
use serde::Serialize;
use shardmerge_routing::ShardId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunReason {
    Invalid,
    LowCoverage,
    Conflict,
}

impl std::fmt::Display for RerunReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid"),
            Self::LowCoverage => write!(f, "low_coverage"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunRequest {
    pub shard_id: ShardId,
    pub reasons: Vec<RerunReason>,
    /// Absent for shards that only appear in conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

/// Shards to re-request, in validation order, then shards seen only in
/// conflicts in conflict order.
pub fn plan_reruns(validation: &MergeValidationResult, min_coverage: f64) -> Vec<RerunRequest> {
    let in_conflict = |shard_id: &ShardId| {
        validation
            .conflicts
            .iter()
            .any(|conflict| &conflict.shard_a == shard_id || &conflict.shard_b == shard_id)
    };

    let mut plan: Vec<RerunRequest> = Vec::new();
    for result in &validation.shard_results {
        let mut reasons = Vec::new();
        if !result.is_valid {
            reasons.push(RerunReason::Invalid);
        }
        if result.coverage < min_coverage {
            reasons.push(RerunReason::LowCoverage);
        }
        if in_conflict(&result.shard_id) {
            reasons.push(RerunReason::Conflict);
        }
        if !reasons.is_empty() {
            plan.push(RerunRequest {
                shard_id: result.shard_id.clone(),
                reasons,
                coverage: Some(result.coverage),
            });
        }
    }

    for conflict in &validation.conflicts {
        for shard_id in [&conflict.shard_a, &conflict.shard_b] {
            let known = validation
                .shard_results
                .iter()
                .any(|result| &result.shard_id == shard_id);
            if known || plan.iter().any(|request| &request.shard_id == shard_id) {
                continue;
            }
            plan.push(RerunRequest {
                shard_id: shard_id.clone(),
                reasons: vec![RerunReason::Conflict],
                coverage: None,
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ShardConflict, UNRESOLVED};
    use crate::validate::ShardValidationResult;
    use serde_json::json;

    fn result(id: &str, is_valid: bool, coverage: f64) -> ShardValidationResult {
        ShardValidationResult {
            shard_id: ShardId::new(id),
            is_valid,
            errors: if is_valid {
                vec![]
            } else {
                vec!["(root): expected object, received string".to_string()]
            },
            warnings: vec![],
            coverage,
        }
    }

    fn conflict(a: &str, b: &str) -> ShardConflict {
        ShardConflict {
            path: "k".to_string(),
            shard_a: ShardId::new(a),
            shard_b: ShardId::new(b),
            value_a: json!(1),
            value_b: json!(2),
            resolution: UNRESOLVED.to_string(),
            also_contributed_by: vec![],
        }
    }

    #[test]
    fn reasons_accumulate_per_shard() {
        let validation = MergeValidationResult {
            is_valid: false,
            shard_results: vec![
                result("healthy", true, 1.0),
                result("thin", true, 0.25),
                result("broken", false, 0.0),
                result("disputed", true, 1.0),
            ],
            conflicts: vec![conflict("disputed", "thin")],
            overall_coverage: 0.5625,
            contamination: vec![],
        };

        let plan = plan_reruns(&validation, 0.5);
        let summary: Vec<(&str, Vec<RerunReason>)> = plan
            .iter()
            .map(|request| (request.shard_id.as_str(), request.reasons.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("thin", vec![RerunReason::LowCoverage, RerunReason::Conflict]),
                ("broken", vec![RerunReason::Invalid, RerunReason::LowCoverage]),
                ("disputed", vec![RerunReason::Conflict]),
            ]
        );
    }

    #[test]
    fn conflict_only_shards_are_appended_once() {
        let validation = MergeValidationResult {
            is_valid: false,
            shard_results: vec![],
            conflicts: vec![conflict("x", "y"), conflict("y", "x")],
            overall_coverage: 0.0,
            contamination: vec![],
        };
        let plan = plan_reruns(&validation, 0.0);
        let ids: Vec<&str> = plan.iter().map(|r| r.shard_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(plan.iter().all(|r| r.coverage.is_none()));
    }
}
