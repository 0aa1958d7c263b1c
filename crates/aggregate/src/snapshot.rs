//! Serializable, read-only views of the entity index.
//!
//! Field names follow the JSON export format (camelCase). Nothing here
//! borrows from the engine, so snapshots can outlive it or cross threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{AggregatedEntity, ConditionEvidence};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub normalized_name: String,
    pub variants: Vec<String>,
    pub total_mentions: u64,
    pub disease_associations: Vec<ConditionSnapshot>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSnapshot {
    pub disease: String,
    pub paper_count: usize,
    pub papers: Vec<String>,
    pub association_types: Vec<String>,
    pub evidence_levels: Vec<String>,
}

impl From<&AggregatedEntity> for EntitySnapshot {
    fn from(entity: &AggregatedEntity) -> Self {
        Self {
            normalized_name: entity.key().to_string(),
            variants: entity.variants().iter().cloned().collect(),
            total_mentions: entity.total_mentions(),
            disease_associations: entity
                .conditions()
                .iter()
                .map(|(disease, evidence)| ConditionSnapshot::new(disease, evidence))
                .collect(),
            first_seen: entity.first_seen(),
            last_seen: entity.last_seen(),
        }
    }
}

impl ConditionSnapshot {
    fn new(disease: &str, evidence: &ConditionEvidence) -> Self {
        Self {
            disease: disease.to_string(),
            paper_count: evidence.document_count(),
            papers: evidence.documents.iter().cloned().collect(),
            association_types: evidence.association_types.iter().cloned().collect(),
            evidence_levels: evidence.evidence_levels.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub unique_entity_count: usize,
    /// Distinct entity/condition pairs.
    pub total_association_count: usize,
    pub top_entities: Vec<EntityMentions>,
    pub top_conditions: Vec<ConditionCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMentions {
    pub name: String,
    pub mentions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCount {
    pub condition: String,
    /// Distinct documents linking any entity to this condition.
    pub document_count: usize,
    /// Per-entity document counts summed.
    pub association_count: usize,
}

/// One corroborated entity/condition pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub entity: String,
    pub condition: String,
    pub document_count: usize,
    pub association_types: Vec<String>,
    pub evidence_levels: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    pub total_biomarkers: usize,
}

/// Full index plus summary, keyed by canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub metadata: ExportMetadata,
    pub summary: Summary,
    pub biomarkers: BTreeMap<String, EntitySnapshot>,
}

impl ExportSnapshot {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
