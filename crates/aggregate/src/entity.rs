use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Evidence collected for one entity/condition pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionEvidence {
    pub documents: BTreeSet<String>,
    pub association_types: BTreeSet<String>,
    pub evidence_levels: BTreeSet<String>,
}

impl ConditionEvidence {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// All observations of one canonical entity across the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEntity {
    key: String,
    variants: BTreeSet<String>,
    total_mentions: u64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    conditions: BTreeMap<String, ConditionEvidence>,
}

impl AggregatedEntity {
    pub(crate) fn new(key: String, at: DateTime<Utc>) -> Self {
        Self {
            key,
            variants: BTreeSet::new(),
            total_mentions: 0,
            first_seen: at,
            last_seen: at,
            conditions: BTreeMap::new(),
        }
    }

    /// Records one mention under `raw_name` at time `at`.
    pub(crate) fn observe(&mut self, raw_name: &str, at: DateTime<Utc>) {
        self.variants.insert(raw_name.to_string());
        self.total_mentions += 1;
        self.first_seen = self.first_seen.min(at);
        self.last_seen = self.last_seen.max(at);
    }

    /// Find-or-create the evidence for an already case-folded condition.
    pub(crate) fn condition_mut(&mut self, condition: String) -> &mut ConditionEvidence {
        self.conditions.entry(condition).or_default()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn variants(&self) -> &BTreeSet<String> {
        &self.variants
    }

    pub fn total_mentions(&self) -> u64 {
        self.total_mentions
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn conditions(&self) -> &BTreeMap<String, ConditionEvidence> {
        &self.conditions
    }

    pub fn condition(&self, label: &str) -> Option<&ConditionEvidence> {
        self.conditions.get(&label.to_lowercase())
    }
}
