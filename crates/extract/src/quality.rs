use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::ExtractionRecord;

/// Placeholder the extraction prompt asks the model to use for unknown fields.
pub const NOT_FOUND: &str = "not found";

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2026;

type CheckFn = Box<dyn Fn(&ExtractionRecord) -> bool + Send + Sync>;

struct QualityCheck {
    name: String,
    check: CheckFn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: f64,
    pub checks: BTreeMap<String, bool>,
}

/// Scores an extraction record as the fraction of checks it passes.
///
/// Never fails: a field that is missing or unparseable just fails its check.
pub struct QualityValidator {
    checks: Vec<QualityCheck>,
}

impl QualityValidator {
    /// A validator with no checks; every record scores 0.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Adds a check. A check registered under an existing name replaces it.
    pub fn with_check<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ExtractionRecord) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        self.checks.retain(|c| c.name != name);
        self.checks.push(QualityCheck {
            name,
            check: Box::new(check),
        });
        self
    }

    pub fn check_names(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|c| c.name.as_str())
    }

    pub fn validate(&self, record: &ExtractionRecord) -> QualityReport {
        let checks: BTreeMap<String, bool> = self
            .checks
            .iter()
            .map(|c| (c.name.clone(), (c.check)(record)))
            .collect();

        let score = if checks.is_empty() {
            0.0
        } else {
            checks.values().filter(|passed| **passed).count() as f64 / checks.len() as f64
        };

        QualityReport { score, checks }
    }

    /// Validates `record` and stores the score and breakdown on it.
    pub fn apply(&self, record: &mut ExtractionRecord) -> f64 {
        let report = self.validate(record);
        record.quality_score = report.score;
        record.quality_checks = report.checks;
        record.quality_score
    }
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::empty()
            .with_check("has_title", |r| {
                is_present(&r.title) && char_len(&r.title) > 5
            })
            .with_check("has_authors", |r| is_present(&r.authors))
            .with_check("has_findings", |r| {
                r.key_findings.iter().any(|f| !f.trim().is_empty())
            })
            .with_check("has_year", |r| parse_year(&r.year).is_some())
            .with_check("sufficient_abstract", |r| char_len(&r.abstract_text) > 50)
            .with_check("has_methodology", |r| {
                is_present(&r.methodology) && char_len(&r.methodology) > 20
            })
            .with_check("has_biomarkers", |r| !r.biomarkers.is_empty())
    }
}

/// Scores `record` against the default check set.
pub fn validate(record: &ExtractionRecord) -> QualityReport {
    QualityValidator::default().validate(record)
}

/// Publication year in `[MIN_YEAR, MAX_YEAR]`, if the field holds one.
pub fn parse_year(raw: &str) -> Option<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
}

fn is_present(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(NOT_FOUND)
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityAssociation;

    fn complete_record() -> ExtractionRecord {
        ExtractionRecord {
            title: "BRCA1 Mutations and Breast Cancer Risk".to_string(),
            authors: "Smith J, Doe J, Johnson M".to_string(),
            year: "2023".to_string(),
            abstract_text: "This study examines the relationship between BRCA1 mutations and breast cancer risk.".to_string(),
            methodology: "Prospective cohort study with 10-year follow-up.".to_string(),
            key_findings: vec!["BRCA1 carriers have a 65% lifetime risk".to_string()],
            biomarkers: vec![EntityAssociation::new(
                "BRCA1",
                &["breast cancer"],
                "causal",
                "observational",
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_record_scores_one() {
        let report = validate(&complete_record());
        assert_eq!(report.checks.len(), 7);
        assert!(report.checks.values().all(|passed| *passed));
        assert_eq!(report.score, 1.0);
    }

    #[test]
    fn test_five_of_seven() {
        let mut record = complete_record();
        record.title = "Not found".to_string();
        record.year = "circa 2020".to_string();

        let report = validate(&record);
        assert!(!report.checks["has_title"]);
        assert!(!report.checks["has_year"]);
        assert!((report.score - 5.0 / 7.0).abs() < 1e-9);
        assert!((report.score - 0.714).abs() < 1e-3);
    }

    #[test]
    fn test_empty_record_scores_zero() {
        let report = validate(&ExtractionRecord::default());
        assert_eq!(report.score, 0.0);
        assert!(report.checks.values().all(|passed| !*passed));
    }

    #[test]
    fn test_boundaries() {
        let mut record = complete_record();
        record.title = "Short".to_string(); // exactly 5 chars
        record.methodology = "x".repeat(20);
        record.abstract_text = "a".repeat(50);
        record.authors = " NOT FOUND ".to_string();

        let report = validate(&record);
        assert!(!report.checks["has_title"]);
        assert!(!report.checks["has_methodology"]);
        assert!(!report.checks["sufficient_abstract"]);
        assert!(!report.checks["has_authors"]);
    }

    #[test]
    fn test_year_range() {
        assert_eq!(parse_year("1900"), Some(1900));
        assert_eq!(parse_year(" 2026 "), Some(2026));
        assert_eq!(parse_year("1899"), None);
        assert_eq!(parse_year("2027"), None);
        assert_eq!(parse_year("Not found"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_custom_checks() {
        let validator = QualityValidator::default()
            .with_check("has_journal", |r| !r.journal.is_empty())
            .with_check("has_biomarkers", |r| r.biomarkers.len() >= 2);

        assert_eq!(validator.check_names().count(), 8);

        let mut record = complete_record();
        let score = validator.apply(&mut record);
        assert!((score - 6.0 / 8.0).abs() < 1e-9);
        assert_eq!(record.quality_score, score);
        assert_eq!(record.quality_checks.get("has_journal"), Some(&false));

        assert_eq!(QualityValidator::empty().validate(&record).score, 0.0);
    }
}
