use regex::Regex;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]").expect("separator pattern is valid"));

static TYPE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(GENE|PROTEIN|BIOMARKER):").expect("prefix pattern is valid"));

/// Maps a raw entity name to its canonical key.
///
/// Hyphens, underscores and whitespace are removed, the result is
/// upper-cased, and leading `GENE:` / `PROTEIN:` / `BIOMARKER:` tags are
/// dropped. `BRCA1`, `BRCA-1`, `brca 1` and `gene:BRCA1` all map to `BRCA1`.
///
/// Prefixes are stripped until none is left, so `normalize` is idempotent.
pub fn normalize(raw: &str) -> String {
    let mut normalized = SEPARATORS.replace_all(raw, "").to_uppercase();

    while let Some(prefix) = TYPE_PREFIX.find(&normalized) {
        normalized.replace_range(..prefix.end(), "");
    }

    normalized
}

/// Like [`normalize`], but `None` when nothing identifying is left.
pub fn canonical_key(raw: &str) -> Option<String> {
    let key = normalize(raw);
    (!key.is_empty()).then_some(key)
}
