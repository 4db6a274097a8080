//! The merge engine.
//!
//! Shards are processed in ascending routing priority (declaration order on
//! ties, unknown shards last). For each shard only its authorized top-level
//! keys are read, so the canonical record can never hold a key outside the
//! union of authorized key sets. When a key is already filled, the configured
//! [`ConflictResolution`] decides the outcome.
//!
//! ```text
//! shard outputs ─► pre-validation? ─► strip unauthorized? ─► priority order
//!                                                               │
//!        {record, validation} ◄─ post-validation (originals) ◄─ key-by-key merge
//! ```

use crate::conflict::values_equal;
use crate::contamination::sanitize;
use crate::digest::record_digest;
use crate::error::MergeError;
use crate::schema::StructuralValidator;
use crate::strategy::{ConflictResolution, MergeOptions};
use crate::validate::{MergeValidationResult, ShardValidator};
use crate::{CanonicalRecord, ShardOutputs};
use serde::Serialize;
use serde_json::Value;
use shardmerge_routing::{RoutingRegistry, ShardId};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Result of a merge call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub data: CanonicalRecord,

    /// Validation of the caller's original (unsanitized) shard outputs.
    pub validation: MergeValidationResult,

    /// Per record key, the shards whose values the record reflects, in
    /// processing order.
    pub sources: BTreeMap<String, Vec<ShardId>>,

    /// Digest of `data`.
    pub digest: String,

    /// Pre-validation stopped the call before any merging.
    pub short_circuited: bool,
}

impl MergeOutcome {
    fn short_circuited(validation: MergeValidationResult) -> Self {
        let data = CanonicalRecord::new();
        Self {
            digest: record_digest(&data),
            data,
            validation,
            sources: BTreeMap::new(),
            short_circuited: true,
        }
    }
}

/// Merges shard outputs under an injected routing table and structural
/// validator. Holds no mutable state, so one engine can serve concurrent
/// calls.
#[derive(Clone, Copy)]
pub struct MergeEngine<'a> {
    routing: &'a RoutingRegistry,
    validator: ShardValidator<'a>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(routing: &'a RoutingRegistry, structure: &'a dyn StructuralValidator) -> Self {
        Self {
            routing,
            validator: ShardValidator::new(routing, structure),
        }
    }

    pub fn routing(&self) -> &'a RoutingRegistry {
        self.routing
    }

    pub fn validator(&self) -> ShardValidator<'a> {
        self.validator
    }

    /// Validate shard outputs without merging.
    pub fn validate(&self, shard_outputs: &ShardOutputs) -> MergeValidationResult {
        self.validator.validate_all(shard_outputs)
    }

    /// Merge shard outputs into one canonical record.
    ///
    /// Fails only under [`ConflictResolution::Error`], on the first record key
    /// two shards disagree about; no partial record is returned then.
    #[instrument(
        level = "debug",
        skip_all,
        fields(shards = shard_outputs.len(), strategy = %options.conflict_resolution)
    )]
    pub fn merge(
        &self,
        shard_outputs: &ShardOutputs,
        options: &MergeOptions,
    ) -> Result<MergeOutcome, MergeError> {
        let strategy = options.conflict_resolution;

        let pre_validation = if options.validate_before_merge {
            let validation = self.validate(shard_outputs);
            let any_invalid = validation
                .shard_results
                .iter()
                .any(|result| !result.is_valid);
            if strategy == ConflictResolution::Error && any_invalid {
                warn!(
                    invalid = validation
                        .shard_results
                        .iter()
                        .filter(|result| !result.is_valid)
                        .count(),
                    "invalid shards under error strategy; merge skipped"
                );
                return Ok(MergeOutcome::short_circuited(validation));
            }
            Some(validation)
        } else {
            None
        };

        let working = if options.strip_unauthorized_keys {
            self.sanitized(shard_outputs)
        } else {
            Cow::Borrowed(shard_outputs)
        };

        let order = self.routing.order_shards(working.keys());
        debug!(
            order = ?order.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            "merge order"
        );

        let mut data = CanonicalRecord::new();
        let mut sources: BTreeMap<String, Vec<ShardId>> = BTreeMap::new();
        for shard_id in order {
            let Some(config) = self.routing.lookup(shard_id.as_str()) else {
                debug!(shard = %shard_id, "unknown shard contributes nothing");
                continue;
            };
            let Some(sections) = working.get(shard_id).and_then(Value::as_object) else {
                continue;
            };

            for key in &config.authorized_keys {
                let Some(incoming) = sections.get(key).filter(|value| !value.is_null()) else {
                    continue;
                };
                let contributors = sources.entry(key.clone()).or_default();
                let Some(existing) = data.get_mut(key) else {
                    data.insert(key.clone(), incoming.clone());
                    contributors.push(shard_id.clone());
                    continue;
                };
                if values_equal(existing, incoming) {
                    contributors.push(shard_id.clone());
                    continue;
                }

                debug!(key = %key, shard = %shard_id, %strategy, "resolving collision");
                match strategy {
                    ConflictResolution::Priority => {}
                    ConflictResolution::Latest => {
                        *existing = incoming.clone();
                        contributors.clear();
                        contributors.push(shard_id.clone());
                    }
                    ConflictResolution::Merge => {
                        let base = std::mem::take(existing);
                        *existing = deep_merge(base, incoming);
                        contributors.push(shard_id.clone());
                    }
                    ConflictResolution::Error => {
                        let existing_shard = contributors
                            .first()
                            .cloned()
                            .unwrap_or_else(|| shard_id.clone());
                        warn!(key = %key, existing = %existing_shard, incoming = %shard_id, "merge halted on conflict");
                        return Err(MergeError::Conflict {
                            key: key.clone(),
                            existing_shard,
                            incoming_shard: shard_id.clone(),
                        });
                    }
                }
            }
        }
        sources.retain(|_, contributors| !contributors.is_empty());

        let validation = pre_validation.unwrap_or_else(|| self.validate(shard_outputs));
        Ok(MergeOutcome {
            digest: record_digest(&data),
            data,
            validation,
            sources,
            short_circuited: false,
        })
    }

    /// Copy of `shard_outputs` with unauthorized keys removed. Borrows the
    /// input when no shard is contaminated.
    fn sanitized<'o>(&self, shard_outputs: &'o ShardOutputs) -> Cow<'o, ShardOutputs> {
        let mut working = Cow::Borrowed(shard_outputs);
        for (shard_id, output) in shard_outputs {
            if let Some(clean) = sanitize(self.routing, shard_id, output) {
                warn!(shard = %shard_id, "stripping unauthorized keys");
                working.to_mut().insert(shard_id.clone(), clean);
            }
        }
        working
    }
}

/// Deep merge `incoming` into `base`.
///
/// Equal values are kept as-is, a null side yields the other side, objects
/// merge field by field, lists concatenate, and any other collision takes
/// `incoming`.
pub fn deep_merge(base: Value, incoming: &Value) -> Value {
    if values_equal(&base, incoming) {
        return base;
    }
    match (base, incoming) {
        (base, Value::Null) => base,
        (Value::Null, incoming) => incoming.clone(),
        (Value::Object(mut fields), Value::Object(incoming_fields)) => {
            for (key, value) in incoming_fields {
                let merged = match fields.remove(key) {
                    Some(current) => deep_merge(current, value),
                    None => value.clone(),
                };
                fields.insert(key.clone(), merged);
            }
            Value::Object(fields)
        }
        (Value::Array(mut items), Value::Array(incoming_items)) => {
            items.extend(incoming_items.iter().cloned());
            Value::Array(items)
        }
        (_, incoming) => incoming.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ShapeSchemas;
    use serde_json::json;
    use shardmerge_routing::ShardRoutingConfig;

    fn registry() -> RoutingRegistry {
        RoutingRegistry::new([
            ShardRoutingConfig::new("a", ["s"], ["k", "only_a"], 1),
            ShardRoutingConfig::new("b", ["s"], ["k", "only_b"], 2),
        ])
    }

    fn outputs(entries: &[(&str, Value)]) -> ShardOutputs {
        entries
            .iter()
            .map(|(id, value)| (ShardId::new(*id), value.clone()))
            .collect()
    }

    #[test]
    fn deep_merge_unions_objects_and_concatenates_lists() {
        let merged = deep_merge(
            json!({"x": 1, "list": [1], "keep": {"p": 1}, "gone": null}),
            &json!({"x": 2, "y": 3, "list": [2], "keep": {"q": 2}, "gone": "back"}),
        );
        assert_eq!(
            merged,
            json!({"x": 2, "y": 3, "list": [1, 2], "keep": {"p": 1, "q": 2}, "gone": "back"})
        );
    }

    #[test]
    fn deep_merge_null_incoming_keeps_base() {
        assert_eq!(deep_merge(json!({"a": 1}), &Value::Null), json!({"a": 1}));
        assert_eq!(deep_merge(json!([1]), &json!([1])), json!([1]));
    }

    #[test]
    fn sources_track_applied_contributions() {
        let registry = registry();
        let schemas = ShapeSchemas::new();
        let engine = MergeEngine::new(&registry, &schemas);
        let shard_outputs = outputs(&[
            ("a", json!({"k": 1, "only_a": true})),
            ("b", json!({"k": 2, "only_b": false})),
        ]);

        let priority = engine
            .merge(&shard_outputs, &MergeOptions::with_strategy(ConflictResolution::Priority))
            .unwrap();
        assert_eq!(priority.sources["k"], vec![ShardId::new("a")]);

        let latest = engine
            .merge(&shard_outputs, &MergeOptions::with_strategy(ConflictResolution::Latest))
            .unwrap();
        assert_eq!(latest.sources["k"], vec![ShardId::new("b")]);
        assert_eq!(latest.sources["only_a"], vec![ShardId::new("a")]);
    }

    #[test]
    fn null_values_never_fill_the_record() {
        let registry = registry();
        let schemas = ShapeSchemas::new();
        let engine = MergeEngine::new(&registry, &schemas);
        let shard_outputs = outputs(&[("a", json!({"k": null})), ("b", json!({"k": 5}))]);
        let outcome = engine.merge(&shard_outputs, &MergeOptions::default()).unwrap();
        assert_eq!(outcome.data.get("k"), Some(&json!(5)));
        assert!(!outcome.sources.contains_key("only_a"));
    }

    #[test]
    fn error_strategy_names_both_shards() {
        let registry = registry();
        let schemas = ShapeSchemas::new();
        let engine = MergeEngine::new(&registry, &schemas);
        let shard_outputs = outputs(&[("b", json!({"k": 2})), ("a", json!({"k": 1}))]);
        let err = engine
            .merge(&shard_outputs, &MergeOptions::with_strategy(ConflictResolution::Error))
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::Conflict {
                key: "k".to_string(),
                existing_shard: ShardId::new("a"),
                incoming_shard: ShardId::new("b"),
            }
        );
    }

    #[test]
    fn integer_and_float_spellings_do_not_halt_error_strategy() {
        let registry = registry();
        let schemas = ShapeSchemas::new();
        let engine = MergeEngine::new(&registry, &schemas);
        let shard_outputs = outputs(&[
            ("a", json!({"k": {"revenue": 100}})),
            ("b", json!({"k": {"revenue": 100.0}})),
        ]);
        let outcome = engine
            .merge(&shard_outputs, &MergeOptions::with_strategy(ConflictResolution::Error))
            .unwrap();
        assert_eq!(outcome.data["k"], json!({"revenue": 100}));
        assert_eq!(outcome.sources["k"], vec![ShardId::new("a"), ShardId::new("b")]);
        assert!(outcome.validation.conflicts.is_empty());
        assert!(outcome.validation.is_valid);

        assert_eq!(deep_merge(json!([1]), &json!([1.0])), json!([1]));
    }

    #[test]
    fn clean_input_is_not_copied() {
        let registry = registry();
        let schemas = ShapeSchemas::new();
        let engine = MergeEngine::new(&registry, &schemas);
        let clean = outputs(&[("a", json!({"k": 1}))]);
        assert!(matches!(engine.sanitized(&clean), Cow::Borrowed(_)));

        let dirty = outputs(&[("a", json!({"k": 1, "stray": 0}))]);
        let sanitized = engine.sanitized(&dirty);
        assert!(matches!(sanitized, Cow::Owned(_)));
        assert_eq!(sanitized[&ShardId::new("a")], json!({"k": 1}));
    }
}
