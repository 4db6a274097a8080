//! Engine configuration documents.
//!
//! One document carries the routing table, merge options and shape schemas:
//!
//! ```toml
//! [[shards]]
//! id = "core-metadata"
//! sources = ["company-registry"]
//! keys = ["company_type", "run_metadata"]
//! priority = 1
//!
//! [merge]
//! conflict_resolution = "priority"
//! strip_unauthorized_keys = true
//!
//! [schemas.core-metadata]
//! company_type = "string"
//! ```
//!
//! JSON documents use the same layout. Without a `shards` table the default
//! routing table applies.

use crate::error::ConfigError;
use crate::schema::ShapeSchemas;
use crate::strategy::MergeOptions;
use serde_json::Value;
use shardmerge_routing::{RoutingIssue, RoutingRegistry, default_routing_registry, parse_routing_table};
use std::path::Path;

const KNOWN_SECTIONS: &[&str] = &["shards", "merge", "schemas"];

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub routing: RoutingRegistry,
    pub merge: MergeOptions,
    pub schemas: ShapeSchemas,
    /// Routing table problems. Entries they name were skipped.
    pub issues: Vec<RoutingIssue>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            routing: default_routing_registry(),
            merge: MergeOptions::default(),
            schemas: ShapeSchemas::default(),
            issues: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from a `.toml` or `.json` file. Other extensions are read as
    /// TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: display.clone(),
            source,
        })?;

        let document = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str::<Value>(&text).map_err(|source| {
                ConfigError::ParseJson {
                    path: display.clone(),
                    source,
                }
            })?,
            _ => toml::from_str::<Value>(&text).map_err(|source| ConfigError::ParseToml {
                path: display.clone(),
                source,
            })?,
        };
        Self::from_json_value(&document)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let document = toml::from_str::<Value>(text).map_err(|source| ConfigError::ParseToml {
            path: "<inline>".to_string(),
            source,
        })?;
        Self::from_json_value(&document)
    }

    pub fn from_json_value(document: &Value) -> Result<Self, ConfigError> {
        let Some(sections) = document.as_object() else {
            return Err(ConfigError::Invalid(
                "configuration root must be a table".to_string(),
            ));
        };
        if let Some(unknown) = sections
            .keys()
            .find(|key| !KNOWN_SECTIONS.contains(&key.as_str()))
        {
            return Err(ConfigError::Invalid(format!("unknown section: {unknown}")));
        }

        let (routing, issues) = match sections.get("shards") {
            Some(shards @ Value::Array(_)) => parse_routing_table(shards),
            Some(_) => {
                return Err(ConfigError::Invalid(
                    "shards: must be an array of tables".to_string(),
                ));
            }
            None => (default_routing_registry(), Vec::new()),
        };

        let merge = match sections.get("merge") {
            Some(merge) => serde_json::from_value::<MergeOptions>(merge.clone())
                .map_err(|err| ConfigError::Invalid(format!("merge: {err}")))?,
            None => MergeOptions::default(),
        };

        let schemas = match sections.get("schemas") {
            Some(schemas) => ShapeSchemas::from_value(schemas).map_err(ConfigError::Invalid)?,
            None => ShapeSchemas::default(),
        };

        Ok(Self {
            routing,
            merge,
            schemas,
            issues,
        })
    }
}
