//! Structural validation of shard payloads.
//!
//! The kernel does not know the downstream schema. It asks a
//! [`StructuralValidator`] whether a payload has the right shape and turns
//! the answer into errors and coverage. [`ShapeSchemas`] is the declarative
//! validator loaded from engine configuration; callers with a richer schema
//! language implement the trait themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shardmerge_routing::ShardId;
use std::collections::BTreeMap;

const ROOT_PATH_LABEL: &str = "(root)";

/// The structural-validation collaborator consulted per shard.
pub trait StructuralValidator: Send + Sync {
    /// Check `output` against the expected shape of `shard_id`.
    ///
    /// Returns every violation found, not just the first.
    fn check(&self, shard_id: &ShardId, output: &Value) -> Result<(), Vec<SchemaViolation>>;
}

/// One structural violation at a path inside a shard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub path: Vec<String>,
    pub message: String,
}

impl SchemaViolation {
    pub fn new<P>(path: impl IntoIterator<Item = P>, message: impl Into<String>) -> Self
    where
        P: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    pub fn at_root(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn dotted_path(&self) -> String {
        if self.path.is_empty() {
            ROOT_PATH_LABEL.to_string()
        } else {
            self.path.join(".")
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.dotted_path(), self.message)
    }
}

/// Expected kind of a top-level section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Any,
    Object,
    Array,
    String,
    Number,
    Boolean,
}

impl ValueKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Expected kinds of a shard's top-level sections.
///
/// Absent and null sections pass; coverage reporting flags them instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeSchema {
    fields: BTreeMap<String, ValueKind>,
}

impl ShapeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.insert(key.into(), kind);
        self
    }

    pub fn check(&self, output: &Value) -> Result<(), Vec<SchemaViolation>> {
        let Some(sections) = output.as_object() else {
            return Err(vec![SchemaViolation::at_root(format!(
                "expected object, received {}",
                describe(output)
            ))]);
        };

        let violations: Vec<SchemaViolation> = self
            .fields
            .iter()
            .filter_map(|(key, kind)| {
                let value = sections.get(key).filter(|value| !value.is_null())?;
                (!kind.matches(value)).then(|| {
                    SchemaViolation::new(
                        [key.as_str()],
                        format!("expected {kind}, received {}", describe(value)),
                    )
                })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Per-shard [`ShapeSchema`]s. Shards without an entry only need an object
/// root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeSchemas {
    shards: BTreeMap<ShardId, ShapeSchema>,
}

impl ShapeSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard(mut self, shard_id: impl Into<ShardId>, schema: ShapeSchema) -> Self {
        self.shards.insert(shard_id.into(), schema);
        self
    }

    pub fn get(&self, shard_id: &str) -> Option<&ShapeSchema> {
        self.shards.get(shard_id)
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Parse `{ "<shard>": { "<key>": "<kind>" } }`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        serde_json::from_value(value.clone()).map_err(|err| format!("schemas: {err}"))
    }
}

impl StructuralValidator for ShapeSchemas {
    fn check(&self, shard_id: &ShardId, output: &Value) -> Result<(), Vec<SchemaViolation>> {
        match self.shards.get(shard_id) {
            Some(schema) => schema.check(output),
            None => ShapeSchema::default().check(output),
        }
    }
}
