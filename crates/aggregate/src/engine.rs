use chrono::{DateTime, Utc};
use extract::{ExtractionRecord, normalize};
use runner::TaskResult;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::entity::AggregatedEntity;
use crate::snapshot::{
    Association, ConditionCount, EntityMentions, EntitySnapshot, ExportMetadata, ExportSnapshot,
    Summary,
};

/// Entries returned by the top-N lists in [`AggregationEngine::summary`].
pub const TOP_N: usize = 10;

/// Document count at which an association reaches full confidence.
pub const FULL_CONFIDENCE_DOCUMENTS: f64 = 10.0;

/// `min(document_count / 10, 1)`.
pub fn confidence(document_count: usize) -> f64 {
    (document_count as f64 / FULL_CONFIDENCE_DOCUMENTS).min(1.0)
}

/// Cross-document entity index for one run.
///
/// Entities live in an arena in order of first observation; `index` maps
/// canonical keys to arena slots. Not thread-safe: feed it from a single
/// fold over completed results.
#[derive(Debug, Default)]
pub struct AggregationEngine {
    entities: Vec<AggregatedEntity>,
    index: HashMap<String, usize>,
    /// First-observation order of condition labels, for tie-breaking.
    condition_order: HashMap<String, usize>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from saved results. Failures and cancellations
    /// contribute nothing.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TaskResult>) -> Self {
        let mut engine = Self::new();
        for result in results {
            engine.ingest_result(result);
        }
        engine
    }

    pub fn ingest_result(&mut self, result: &TaskResult) -> usize {
        match result {
            TaskResult::Success { input, record, .. } => self.ingest(record, &input.document_id),
            _ => 0,
        }
    }

    /// Folds every association in `record` into the index, attributed to
    /// `document_id`. Returns how many associations were accepted.
    pub fn ingest(&mut self, record: &ExtractionRecord, document_id: &str) -> usize {
        self.ingest_at(record, document_id, Utc::now())
    }

    pub fn ingest_at(&mut self, record: &ExtractionRecord, document_id: &str, at: DateTime<Utc>) -> usize {
        let mut accepted = 0;

        for association in &record.biomarkers {
            let key = normalize(&association.name);
            if key.is_empty() {
                debug!(document = document_id, raw = %association.name, "skipping entity with empty canonical key");
                continue;
            }

            let slot = self.find_or_create(key, at);
            let entity = &mut self.entities[slot];
            entity.observe(&association.name, at);

            for disease in &association.diseases {
                if disease.trim().is_empty() {
                    continue;
                }
                let condition = disease.to_lowercase();

                let next = self.condition_order.len();
                self.condition_order.entry(condition.clone()).or_insert(next);

                let evidence = entity.condition_mut(condition);
                evidence.documents.insert(document_id.to_string());
                evidence.association_types.insert(association.association_type.clone());
                evidence.evidence_levels.insert(association.evidence_level.clone());
            }

            accepted += 1;
        }

        if accepted > 0 {
            debug!(document = document_id, accepted, entities = self.entities.len(), "ingested record");
        }
        accepted
    }

    fn find_or_create(&mut self, key: String, at: DateTime<Utc>) -> usize {
        if let Some(&slot) = self.index.get(&key) {
            return slot;
        }

        let slot = self.entities.len();
        self.entities.push(AggregatedEntity::new(key.clone(), at));
        self.index.insert(key, slot);
        slot
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in order of first observation.
    pub fn entities(&self) -> impl Iterator<Item = &AggregatedEntity> {
        self.entities.iter()
    }

    pub fn get(&self, raw_name: &str) -> Option<&AggregatedEntity> {
        self.index
            .get(&normalize(raw_name))
            .map(|&slot| &self.entities[slot])
    }

    pub fn total_mentions(&self) -> u64 {
        self.entities.iter().map(AggregatedEntity::total_mentions).sum()
    }

    pub fn details(&self, raw_name: &str) -> Option<EntitySnapshot> {
        self.get(raw_name).map(EntitySnapshot::from)
    }

    pub fn summary(&self) -> Summary {
        let total_association_count = self.entities.iter().map(|e| e.conditions().len()).sum();

        // stable sort: equal first_seen keeps arena order
        let mut by_mentions: Vec<&AggregatedEntity> = self.entities.iter().collect();
        by_mentions.sort_by(|a, b| {
            b.total_mentions()
                .cmp(&a.total_mentions())
                .then_with(|| a.first_seen().cmp(&b.first_seen()))
        });
        let top_entities = by_mentions
            .into_iter()
            .take(TOP_N)
            .map(|e| EntityMentions {
                name: e.key().to_string(),
                mentions: e.total_mentions(),
            })
            .collect();

        let mut conditions: HashMap<&str, (BTreeSet<&str>, usize)> = HashMap::new();
        for entity in &self.entities {
            for (label, evidence) in entity.conditions() {
                let (documents, associations) = conditions.entry(label.as_str()).or_default();
                documents.extend(evidence.documents.iter().map(String::as_str));
                *associations += evidence.document_count();
            }
        }

        let mut ranked: Vec<_> = conditions.into_iter().collect();
        ranked.sort_by(|(a_label, (a_docs, _)), (b_label, (b_docs, _))| {
            b_docs
                .len()
                .cmp(&a_docs.len())
                .then_with(|| self.condition_rank(a_label).cmp(&self.condition_rank(b_label)))
        });
        let top_conditions = ranked
            .into_iter()
            .take(TOP_N)
            .map(|(label, (documents, associations))| ConditionCount {
                condition: label.to_string(),
                document_count: documents.len(),
                association_count: associations,
            })
            .collect();

        Summary {
            unique_entity_count: self.entities.len(),
            total_association_count,
            top_entities,
            top_conditions,
        }
    }

    fn condition_rank(&self, label: &str) -> usize {
        self.condition_order.get(label).copied().unwrap_or(usize::MAX)
    }

    /// Entity/condition pairs backed by at least `min_documents` distinct
    /// documents, most corroborated first.
    pub fn high_confidence_associations(&self, min_documents: usize) -> Vec<Association> {
        let mut associations: Vec<Association> = self
            .entities
            .iter()
            .flat_map(|entity| {
                entity
                    .conditions()
                    .iter()
                    .filter(move |(_, evidence)| evidence.document_count() >= min_documents)
                    .map(move |(condition, evidence)| Association {
                        entity: entity.key().to_string(),
                        condition: condition.clone(),
                        document_count: evidence.document_count(),
                        association_types: evidence.association_types.iter().cloned().collect(),
                        evidence_levels: evidence.evidence_levels.iter().cloned().collect(),
                        confidence: confidence(evidence.document_count()),
                    })
            })
            .collect();

        associations.sort_by(|a, b| b.document_count.cmp(&a.document_count));
        associations
    }

    pub fn export(&self) -> ExportSnapshot {
        let biomarkers = self
            .entities
            .iter()
            .map(|e| (e.key().to_string(), EntitySnapshot::from(e)))
            .collect();

        let snapshot = ExportSnapshot {
            metadata: ExportMetadata {
                export_date: Utc::now(),
                total_biomarkers: self.entities.len(),
            },
            summary: self.summary(),
            biomarkers,
        };

        info!(entities = snapshot.metadata.total_biomarkers, "exported entity index");
        snapshot
    }
}
