use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One biomarker–disease association as emitted by the extraction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAssociation {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub diseases: Vec<String>,
    #[serde(default = "unknown_label", deserialize_with = "lenient::label")]
    pub association_type: String,
    #[serde(default = "unknown_label", deserialize_with = "lenient::label")]
    pub evidence_level: String,
}

impl EntityAssociation {
    pub fn new(
        name: impl Into<String>,
        diseases: &[&str],
        association_type: impl Into<String>,
        evidence_level: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            diseases: diseases.iter().map(|d| d.to_string()).collect(),
            association_type: association_type.into(),
            evidence_level: evidence_level.into(),
        }
    }
}

fn unknown_label() -> String {
    "unknown".to_string()
}

/// Where a record came from and how it was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub provider: String,
    pub model: String,
    pub chunks_processed: usize,
    pub page_count: usize,
    pub text_length: usize,
    pub fingerprint: String,
}

/// Structured output for one document.
///
/// String fields default to empty when the model leaves them out; numbers
/// and lists are accepted where strings are expected and vice versa, so a
/// sloppy field only fails its quality check instead of the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::joined")]
    pub authors: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub journal: String,
    #[serde(rename = "abstract", default, deserialize_with = "lenient::string")]
    pub abstract_text: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub research_question: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub methodology: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub key_findings: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub conclusions: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub limitations: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub future_work: String,
    #[serde(default, deserialize_with = "lenient::associations")]
    pub biomarkers: Vec<EntityAssociation>,
    #[serde(default, deserialize_with = "lenient::score")]
    pub quality_score: f64,
    #[serde(default, deserialize_with = "lenient::checks")]
    pub quality_checks: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

mod lenient {
    use super::EntityAssociation;
    use serde::{Deserialize, Deserializer};
    use std::collections::BTreeMap;
    use serde_json::Value;

    fn scalar(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn label<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar(Value::deserialize(d)?)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(super::unknown_label))
    }

    /// A list of strings, or a single string treated as a one-item list.
    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        })
    }

    /// A comma-separated string, or a list joined with ", ".
    pub fn joined<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar).collect::<Vec<_>>().join(", "),
            other => scalar(other).unwrap_or_default(),
        })
    }

    /// A finite number, anything else reads as 0.
    pub fn score<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Value::deserialize(d)?
            .as_f64()
            .filter(|n| n.is_finite())
            .unwrap_or_default())
    }

    /// Keeps boolean entries of an object.
    pub fn checks<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(name, passed)| passed.as_bool().map(|b| (name, b)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    /// Keeps the entries that look like associations and drops the rest.
    pub fn associations<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<EntityAssociation>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record_round_trips_field_names() {
        let record: ExtractionRecord = serde_json::from_value(json!({
            "title": "BRCA1 in breast cancer",
            "authors": "Smith J, Doe J",
            "year": "2023",
            "abstract": "A study.",
            "key_findings": ["one", "two"],
            "biomarkers": [{
                "name": "BRCA1",
                "diseases": ["breast cancer"],
                "association_type": "causal",
                "evidence_level": "clinical_trial"
            }]
        }))
        .unwrap();

        assert_eq!(record.abstract_text, "A study.");
        assert_eq!(record.biomarkers[0].diseases, vec!["breast cancer"]);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["abstract"], "A study.");
        assert!(value.get("provenance").is_none());
    }

    #[test]
    fn test_lenient_fields() {
        let record: ExtractionRecord = serde_json::from_value(json!({
            "title": null,
            "authors": ["Smith J", "Doe J"],
            "year": 2021,
            "key_findings": "single finding",
            "biomarkers": [
                "not an object",
                {"name": "EGFR", "diseases": "lung cancer", "association_type": null},
                {"name": "KRAS", "diseases": [1, "colorectal cancer"]}
            ]
        }))
        .unwrap();

        assert_eq!(record.title, "");
        assert_eq!(record.authors, "Smith J, Doe J");
        assert_eq!(record.year, "2021");
        assert_eq!(record.key_findings, vec!["single finding"]);
        assert_eq!(record.biomarkers.len(), 2);
        assert_eq!(record.biomarkers[0].diseases, vec!["lung cancer"]);
        assert_eq!(record.biomarkers[0].association_type, "unknown");
        assert_eq!(record.biomarkers[0].evidence_level, "unknown");
        assert_eq!(record.biomarkers[1].diseases, vec!["1", "colorectal cancer"]);
    }

    #[test]
    fn test_malformed_quality_fields_do_not_fail_the_parse() {
        let record: ExtractionRecord = serde_json::from_value(json!({
            "title": "EGFR in lung cancer",
            "quality_score": "high",
            "quality_checks": {"has_title": true, "has_year": "yes"}
        }))
        .unwrap();
        assert_eq!(record.quality_score, 0.0);
        assert_eq!(record.quality_checks.len(), 1);
        assert!(record.quality_checks["has_title"]);

        let record: ExtractionRecord =
            serde_json::from_value(json!({"quality_score": null, "quality_checks": []})).unwrap();
        assert_eq!(record.quality_score, 0.0);
        assert!(record.quality_checks.is_empty());

        let record: ExtractionRecord = serde_json::from_value(json!({"quality_score": 0.75})).unwrap();
        assert_eq!(record.quality_score, 0.75);
    }
}
