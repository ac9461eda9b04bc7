use crate::error::{Error, Result};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Structural regions whose text is indexed; everything else is ignored
const CONTENT_REGIONS: &str = "title, p, h1, h2, h3, pre, li";

/// Deleted outright, so "word-word" becomes "wordword"
const PUNCTUATION: &[char] = &['.', ',', ':', ';', '(', ')', '+', '-'];

lazy_static::lazy_static! {
    static ref CONTENT_SELECTOR: Selector =
        Selector::parse(CONTENT_REGIONS).expect("content region selector is valid CSS");
}

/// Term -> number of occurrences in one document
pub type TermCounts = HashMap<String, u32>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Self
    }

    /// Lower-cased text of every content region, one region per line.
    ///
    /// Nested regions are each selected, so text in `<li><p>..</p></li>`
    /// is emitted twice.
    pub fn extract_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut text = String::new();
        for region in document.select(&CONTENT_SELECTOR) {
            let region_text: String = region.text().collect();
            text.push_str(&region_text.to_lowercase());
            text.push('\n');
        }
        text
    }

    /// Remove punctuation characters
    fn punctuation_filter(&self, text: &str) -> String {
        text.chars().filter(|c| !PUNCTUATION.contains(c)).collect()
    }

    /// Split normalized text into terms
    pub fn analyze(&self, text: &str) -> Vec<String> {
        self.punctuation_filter(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Analyze and count term frequencies
    pub fn analyze_with_frequencies(&self, text: &str) -> TermCounts {
        let mut frequencies = TermCounts::new();
        for term in self.analyze(text) {
            *frequencies.entry(term).or_insert(0) += 1;
        }
        frequencies
    }

    /// Full pipeline over raw HTML
    pub fn term_counts(&self, html: &str) -> TermCounts {
        self.analyze_with_frequencies(&self.extract_text(html))
    }

    /// Tokenize a document read from `reader`; `path` is only used in errors.
    ///
    /// Invalid UTF-8 sequences become U+FFFD instead of failing the document.
    pub fn tokenize_reader<R: Read>(&self, path: &Path, mut reader: R) -> Result<TermCounts> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let html = String::from_utf8_lossy(&bytes);
        Ok(self.term_counts(&html))
    }

    pub fn tokenize_file(&self, path: &Path) -> Result<TermCounts> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.tokenize_reader(path, BufReader::new(file))
    }
}
