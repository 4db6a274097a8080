//! Static shard routing.
//!
//! Every shard is produced by one upstream producer and may only write a
//! fixed subset of the canonical record's top-level keys. The registry holds
//! that ownership table together with the upstream sources a shard waits on
//! and the priority that orders shards during a merge.
//!
//! The registry is immutable once built and is handed to the merge engine by
//! reference, so tests can substitute their own tables.

use crate::table::{RoutingIssue, failure_class};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_SHARD_ROUTES: [(&str, &[&str], &[&str], i32); 5] = [
    (
        "core-metadata",
        &["company-registry"],
        &["company_type", "run_metadata", "company_profile"],
        1,
    ),
    (
        "base-metrics",
        &["financial-statements"],
        &["financials", "operating_metrics"],
        2,
    ),
    (
        "valuation",
        &["financial-statements", "market-feed"],
        &["valuation", "comparables"],
        3,
    ),
    (
        "risks-events",
        &["news-feed", "regulatory-filings"],
        &["risks", "events"],
        4,
    ),
    (
        "public-market",
        &["market-feed"],
        &["market_data", "ownership"],
        5,
    ),
];

/// Identifier of one producer slice.
///
/// Kept as an opaque string so ids the registry does not know about can
/// still travel through validation and be reported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShardId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ShardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ShardId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Routing entry for one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardRoutingConfig {
    pub shard_id: ShardId,

    /// Upstream sources that must complete before the shard can be produced.
    pub required_sources: Vec<String>,

    /// Top-level record keys this shard may write, in declaration order.
    pub authorized_keys: Vec<String>,

    /// Lower value means higher precedence.
    pub priority: i32,
}

impl ShardRoutingConfig {
    /// Build a routing entry. Repeated keys and sources keep their first
    /// occurrence.
    pub fn new<S, K>(
        shard_id: impl Into<ShardId>,
        required_sources: impl IntoIterator<Item = S>,
        authorized_keys: impl IntoIterator<Item = K>,
        priority: i32,
    ) -> Self
    where
        S: Into<String>,
        K: Into<String>,
    {
        Self {
            shard_id: shard_id.into(),
            required_sources: dedup_in_order(required_sources.into_iter().map(Into::into)),
            authorized_keys: dedup_in_order(authorized_keys.into_iter().map(Into::into)),
            priority,
        }
    }

    /// Whether `key` is one of this shard's authorized top-level keys.
    pub fn authorizes(&self, key: &str) -> bool {
        self.authorized_keys.iter().any(|candidate| candidate == key)
    }
}

/// Immutable shard routing table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingRegistry {
    shards: Vec<ShardRoutingConfig>,
}

impl RoutingRegistry {
    /// Build a registry from entries in declaration order.
    ///
    /// A shard id declared twice keeps its first entry.
    pub fn new(configs: impl IntoIterator<Item = ShardRoutingConfig>) -> Self {
        Self::from_configs(configs).0
    }

    /// Like [`RoutingRegistry::new`], also reporting dropped duplicates and
    /// keys authorized for more than one shard.
    pub fn from_configs(
        configs: impl IntoIterator<Item = ShardRoutingConfig>,
    ) -> (Self, Vec<RoutingIssue>) {
        Self::from_indexed_configs(configs.into_iter().enumerate())
    }

    /// Like [`RoutingRegistry::from_configs`] for entries that keep their
    /// position in a source document, so issue paths name that position.
    pub fn from_indexed_configs(
        configs: impl IntoIterator<Item = (usize, ShardRoutingConfig)>,
    ) -> (Self, Vec<RoutingIssue>) {
        let mut issues = Vec::new();
        let mut shards: Vec<ShardRoutingConfig> = Vec::new();
        for (index, config) in configs {
            if shards.iter().any(|seen| seen.shard_id == config.shard_id) {
                issues.push(RoutingIssue::new(
                    failure_class::DUPLICATE_SHARD,
                    format!("shards[{index}].id"),
                    format!(
                        "shard `{}` is already declared; later entry ignored",
                        config.shard_id
                    ),
                ));
                continue;
            }
            shards.push(config);
        }

        let registry = Self { shards };
        for (key, owners) in registry.overlapping_keys() {
            let owners: Vec<&str> = owners.iter().map(ShardId::as_str).collect();
            issues.push(RoutingIssue::new(
                failure_class::KEY_OVERLAP,
                format!("keys.{key}"),
                format!("authorized for several shards: {}", owners.join(", ")),
            ));
        }
        (registry, issues)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ShardRoutingConfig> {
        self.shards.iter()
    }

    pub fn lookup(&self, shard_id: &str) -> Option<&ShardRoutingConfig> {
        self.shards
            .iter()
            .find(|config| config.shard_id.as_str() == shard_id)
    }

    /// Shards that wait on `source_id`, in declaration order.
    pub fn shards_requiring(&self, source_id: &str) -> Vec<ShardId> {
        self.shards
            .iter()
            .filter(|config| {
                config
                    .required_sources
                    .iter()
                    .any(|source| source == source_id)
            })
            .map(|config| config.shard_id.clone())
            .collect()
    }

    /// True iff `shard_id` is known and every one of its required sources is
    /// in `completed_sources`.
    pub fn ready<S>(&self, shard_id: &str, completed_sources: &BTreeSet<S>) -> bool
    where
        S: Borrow<str> + Ord,
    {
        self.lookup(shard_id).is_some_and(|config| {
            config
                .required_sources
                .iter()
                .all(|source| completed_sources.contains(source.as_str()))
        })
    }

    /// Every shard whose required sources are all complete, in priority order.
    pub fn ready_shards<S>(&self, completed_sources: &BTreeSet<S>) -> Vec<ShardId>
    where
        S: Borrow<str> + Ord,
    {
        self.ordered_by_priority()
            .into_iter()
            .filter(|shard_id| self.ready(shard_id.as_str(), completed_sources))
            .collect()
    }

    /// Shard ids by ascending priority; equal priorities keep declaration
    /// order.
    pub fn ordered_by_priority(&self) -> Vec<ShardId> {
        let mut ranked: Vec<(i32, usize, &ShardId)> = self
            .shards
            .iter()
            .enumerate()
            .map(|(index, config)| (config.priority, index, &config.shard_id))
            .collect();
        ranked.sort_by_key(|(priority, index, _)| (*priority, *index));
        ranked.into_iter().map(|(_, _, id)| id.clone()).collect()
    }

    /// Order arbitrary shard ids for processing: known shards by priority and
    /// declaration order, unknown shards last sorted by id.
    pub fn order_shards<'a, I>(&self, shard_ids: I) -> Vec<&'a ShardId>
    where
        I: IntoIterator<Item = &'a ShardId>,
    {
        let mut ids: Vec<&'a ShardId> = shard_ids.into_iter().collect();
        ids.sort_by(|a, b| self.rank(a).cmp(&self.rank(b)).then_with(|| a.cmp(b)));
        ids
    }

    /// Union of every shard's authorized keys.
    pub fn authorized_keys_union(&self) -> BTreeSet<String> {
        self.shards
            .iter()
            .flat_map(|config| config.authorized_keys.iter().cloned())
            .collect()
    }

    /// Keys authorized for more than one shard, with their owners in
    /// declaration order.
    pub fn overlapping_keys(&self) -> BTreeMap<String, Vec<ShardId>> {
        let mut owners: BTreeMap<String, Vec<ShardId>> = BTreeMap::new();
        for config in &self.shards {
            for key in &config.authorized_keys {
                owners
                    .entry(key.clone())
                    .or_default()
                    .push(config.shard_id.clone());
            }
        }
        owners.retain(|_, shard_ids| shard_ids.len() > 1);
        owners
    }

    fn rank(&self, shard_id: &ShardId) -> (bool, i32, usize) {
        self.shards
            .iter()
            .position(|config| &config.shard_id == shard_id)
            .map(|index| (false, self.shards[index].priority, index))
            .unwrap_or((true, 0, 0))
    }
}

/// The built-in routing table for the five canonical shards.
pub fn default_routing_registry() -> RoutingRegistry {
    RoutingRegistry::new(DEFAULT_SHARD_ROUTES.iter().map(
        |(shard_id, sources, keys, priority)| {
            ShardRoutingConfig::new(
                *shard_id,
                sources.iter().copied(),
                keys.iter().copied(),
                *priority,
            )
        },
    ))
}

fn dedup_in_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}
