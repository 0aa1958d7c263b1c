use serde::Serialize;
use std::io;

use crate::engine::AggregationEngine;

pub const ASSOCIATION_HEADER: [&str; 7] = [
    "Biomarker",
    "Disease",
    "Paper Count",
    "Association Types",
    "Evidence Levels",
    "Total Mentions",
    "Name Variants",
];

/// Variants listed per row; the full set is in the JSON export.
const MAX_VARIANTS: usize = 3;

/// One entity/condition pair, flattened for spreadsheets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRow {
    pub biomarker: String,
    pub disease: String,
    pub paper_count: usize,
    pub association_types: String,
    pub evidence_levels: String,
    pub total_mentions: u64,
    pub name_variants: String,
}

impl AggregationEngine {
    /// Every entity/condition pair, ordered by canonical key then condition.
    pub fn association_rows(&self) -> Vec<AssociationRow> {
        let mut entities: Vec<_> = self.entities().collect();
        entities.sort_by(|a, b| a.key().cmp(b.key()));

        entities
            .into_iter()
            .flat_map(|entity| {
                let variants = entity
                    .variants()
                    .iter()
                    .take(MAX_VARIANTS)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");

                entity
                    .conditions()
                    .iter()
                    .map(move |(disease, evidence)| AssociationRow {
                        biomarker: entity.key().to_string(),
                        disease: disease.clone(),
                        paper_count: evidence.document_count(),
                        association_types: join(&evidence.association_types),
                        evidence_levels: join(&evidence.evidence_levels),
                        total_mentions: entity.total_mentions(),
                        name_variants: variants.clone(),
                    })
            })
            .collect()
    }

    /// Writes [`association_rows`](Self::association_rows) as CSV with a
    /// header line, even when the index is empty. Returns the row count.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<usize, csv::Error> {
        let rows = self.association_rows();
        let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

        out.write_record(ASSOCIATION_HEADER)?;
        for row in &rows {
            out.serialize(row)?;
        }
        out.flush()?;
        Ok(rows.len())
    }
}

fn join<'a>(labels: impl IntoIterator<Item = &'a String>) -> String {
    labels
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
