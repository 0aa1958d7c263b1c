pub fn build_extraction_prompt(paper_text: &str, part: Option<(usize, usize)>) -> String {
    let part_note = match part {
        Some((index, total)) if total > 1 => format!(" (part {index} of {total})"),
        _ => String::new(),
    };

    format!(
        r#"You are an expert research paper analyst. Extract comprehensive information from the following research paper.

Pay special attention to:
1. Biomarker-disease associations (genes, proteins, metabolites linked to diseases)
2. Clinical relevance and evidence quality
3. Methodological rigor

SCHEMA:
{{
  "title": "paper title",
  "authors": "author1, author2, author3",
  "year": "YYYY",
  "journal": "journal name",
  "abstract": "brief 2-3 sentence summary",
  "research_question": "main question",
  "methodology": "methods used",
  "key_findings": ["finding 1", "finding 2", "finding 3"],
  "conclusions": "main conclusions",
  "limitations": "limitations mentioned",
  "future_work": "suggested future research",
  "biomarkers": [
    {{"name": "BRCA1", "diseases": ["breast cancer"], "association_type": "causal|correlative|predictive|prognostic", "evidence_level": "clinical_trial|observational|meta_analysis|in_vitro"}}
  ]
}}

RULES:
- If a string field cannot be determined from the text, use "Not found"
- Use an empty list for list fields with nothing to report
- Output ONLY the JSON object, no markdown, no explanations

Research Paper{part_note}:
{paper_text}

JSON OUTPUT:"#
    )
}
