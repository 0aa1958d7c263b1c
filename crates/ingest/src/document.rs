use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunker::PAGE_MARKER;

/// Plain text pulled out of one source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentText {
    pub text: String,
    pub page_count: usize,
    pub fingerprint: String,
}

impl DocumentText {
    pub fn new(text: String) -> Self {
        let page_count = count_pages(&text);
        let fingerprint = fingerprint(&text);

        Self {
            text,
            page_count,
            fingerprint,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Length in characters, which is also what the chunker budgets against.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Stable content id: first 16 bytes of the SHA-256 digest, hex encoded.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Counts `--- Page N ---` markers. Text without markers is one page
/// unless it is blank.
fn count_pages(text: &str) -> usize {
    let marked = text
        .lines()
        .filter(|line| line.trim_start().starts_with(PAGE_MARKER))
        .count();

    match marked {
        0 if text.trim().is_empty() => 0,
        0 => 1,
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_from_markers() {
        let doc = DocumentText::new(
            "--- Page 1 ---\nintro\n\n--- Page 2 ---\nmethods\n\n--- Page 3 ---\nresults".to_string(),
        );
        assert_eq!(doc.page_count, 3);
    }

    #[test]
    fn test_unmarked_text_is_single_page() {
        assert_eq!(DocumentText::new("just text".to_string()).page_count, 1);
        assert_eq!(DocumentText::new("   \n".to_string()).page_count, 0);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint("BRCA1 and breast cancer");
        let b = fingerprint("BRCA1 and breast cancer");
        let c = fingerprint("BRCA2 and breast cancer");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }
}
