use crate::error::{Error, Result};
use crate::tokenizer::{TermCounts, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// An indexed document: its path and the occurrences of every distinct term.
///
/// Built once by tokenizing a source file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    path: String,
    term_counts: TermCounts,
}

impl Document {
    /// Zero counts are dropped so that every stored term occurs at least once.
    pub fn new(path: String, mut term_counts: TermCounts) -> Self {
        term_counts.retain(|_, count| *count > 0);
        Self { path, term_counts }
    }

    /// Tokenize the file at `path` into a document.
    ///
    /// The path is the document identifier, so it must be valid UTF-8: a
    /// lossy conversion could give two files the same identifier.
    pub fn from_file(path: &Path, tokenizer: &Tokenizer) -> Result<Self> {
        let id = path.to_str().ok_or_else(|| Error::Parse {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;
        let term_counts = tokenizer.tokenize_file(path)?;
        Ok(Self::new(id.to_string(), term_counts))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn term_counts(&self) -> &TermCounts {
        &self.term_counts
    }

    /// Number of distinct terms, not the number of tokens
    pub fn word_count(&self) -> usize {
        self.term_counts.len()
    }

    /// Total number of tokens (informational, TF uses `word_count`)
    pub fn total_tokens(&self) -> u64 {
        self.term_counts.values().map(|&count| u64::from(count)).sum()
    }

    pub fn occurrences(&self, term: &str) -> u32 {
        self.term_counts.get(term).copied().unwrap_or(0)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.term_counts.contains_key(term)
    }
}

/// First path that appears more than once in `documents`
pub fn find_duplicate(documents: &[Document]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(documents.len());
    documents.iter().map(Document::path).find(|path| !seen.insert(*path))
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} words: {}", self.path, self.word_count())
    }
}
