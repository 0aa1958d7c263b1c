/// Marker the text extractor puts in front of every page.
pub const PAGE_MARKER: &str = "--- Page";

/// Splits long documents on page boundaries so each piece fits the
/// summarizer's context budget.
pub struct Chunker {
    max_chars: usize,
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Returns at least one chunk. Concatenating the chunks yields `text`.
    ///
    /// A single page longer than the budget is kept whole rather than cut
    /// mid-page.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.max_chars {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for (i, piece) in text.split(PAGE_MARKER).enumerate() {
            let page = if i == 0 {
                piece.to_string()
            } else {
                format!("{PAGE_MARKER}{piece}")
            };
            if page.is_empty() {
                continue;
            }

            let page_len = char_len(&page);
            if !current.is_empty() && current_len + page_len > self.max_chars {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            current.push_str(&page);
            current_len += page_len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(100_000)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
