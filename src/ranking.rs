use crate::document::Document;
use std::collections::HashMap;

/// Term frequency: occurrences of `term` over the number of distinct terms
/// in `doc`. A document with no terms has frequency 0 for every term.
pub fn term_frequency(term: &str, doc: &Document) -> f64 {
    let word_count = doc.word_count();
    if word_count == 0 {
        return 0.0;
    }
    f64::from(doc.occurrences(term)) / word_count as f64
}

/// Smoothed inverse document frequency: `log10(N / (1 + df)) + 1`.
pub fn inverse_document_frequency(document_count: usize, docs_with_term: usize) -> f64 {
    let numerator = document_count as f64;
    let denominator = 1.0 + docs_with_term as f64;
    (numerator / denominator).log10() + 1.0
}

/// Sum of `tf * idf` over the query terms; repeated query terms count again.
pub fn tf_idf_score(query_terms: &[String], doc: &Document, idf: &HashMap<String, f64>) -> f64 {
    query_terms
        .iter()
        .map(|term| term_frequency(term, doc) * idf.get(term).copied().unwrap_or(0.0))
        .sum()
}

/// Ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub path: String,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(path: String, score: f64) -> Self {
        Self { path, score }
    }
}

/// Score every document and sort by descending score.
///
/// Documents matching no query term stay in the ranking with score 0. The
/// sort is stable, so ties keep corpus order.
pub fn rank_documents(
    query_terms: &[String],
    documents: &[Document],
    idf: &HashMap<String, f64>,
) -> Vec<ScoredDocument> {
    let mut scored_docs: Vec<ScoredDocument> = documents
        .iter()
        .map(|doc| ScoredDocument::new(doc.path().to_string(), tf_idf_score(query_terms, doc, idf)))
        .collect();

    scored_docs.sort_by(|a, b| b.score.total_cmp(&a.score));

    scored_docs
}
