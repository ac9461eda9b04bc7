use crate::document::{find_duplicate, Document};
use crate::error::{Error, Result};
use crate::ranking::{inverse_document_frequency, rank_documents, ScoredDocument};
use crate::snapshot;
use crate::tokenizer::Tokenizer;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// What a bulk load does when a single document cannot be indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPolicy {
    /// Record the failure in the report and keep indexing
    #[default]
    SkipFailed,
    /// Abort the whole load on the first failure
    Strict,
}

/// Bulk load options
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub policy: LoadPolicy,
    /// Loader threads; `None` uses the available parallelism
    pub workers: Option<usize>,
    /// File extensions to index, compared case-insensitively
    pub extensions: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            policy: LoadPolicy::SkipFailed,
            workers: None,
            extensions: vec!["html".to_string()],
        }
    }
}

impl LoadOptions {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// A document skipped during a bulk load
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of a bulk load
#[derive(Debug, Default)]
pub struct LoadReport {
    pub indexed: usize,
    pub failures: Vec<LoadFailure>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Empty,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub distinct_terms: usize,
    pub total_tokens: u64,
}

/// TF-IDF search engine over a corpus of indexed documents.
///
/// An engine is populated once, either by [`Engine::load`] or from a
/// snapshot, and is read-only afterwards. Searching borrows it shared, so
/// any number of searches may run while nothing can load into it.
#[derive(Debug, Default)]
pub struct Engine {
    documents: Vec<Document>,
    tokenizer: Tokenizer,
    state: EngineState,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ready engine from already tokenized documents
    pub fn from_documents(documents: Vec<Document>) -> Result<Self> {
        if let Some(path) = find_duplicate(&documents) {
            return Err(Error::DuplicateDocument(path.to_string()));
        }
        Ok(Self {
            documents,
            tokenizer: Tokenizer::new(),
            state: EngineState::Ready,
        })
    }

    /// Build a ready engine from a snapshot file
    pub fn from_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let mut engine = Self::new();
        engine.load_state(path)?;
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Walk `root`, tokenize every matching file and index it.
    ///
    /// Symbolic links are not followed. Walking and tokenizing run on a
    /// dedicated worker pool; finished documents go through one locked sink,
    /// so the resulting corpus order depends on scheduling. The engine is
    /// only updated when the whole pass succeeds.
    pub fn load(&mut self, root: impl AsRef<Path>, options: &LoadOptions) -> Result<LoadReport> {
        let root = root.as_ref();
        if self.state == EngineState::Ready {
            return Err(Error::AlreadyLoaded(self.documents.len()));
        }

        let metadata = fs::metadata(root).map_err(|e| traversal_error(root, e))?;
        if !metadata.is_dir() {
            return Err(traversal_error(root, "not a directory"));
        }

        let start = Instant::now();
        let pool = build_pool(options.workers)?;
        let sink: Mutex<Vec<Document>> = Mutex::new(Vec::new());
        let failures: Mutex<Vec<LoadFailure>> = Mutex::new(Vec::new());
        let tokenizer = self.tokenizer;

        tracing::info!(
            root = %root.display(),
            workers = pool.current_num_threads(),
            "loading documents"
        );

        pool.install(|| {
            WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .par_bridge()
                .try_for_each(|entry| -> Result<()> {
                    let entry = entry.map_err(|e| traversal_error(root, e))?;
                    if !entry.file_type().is_file() || !options.accepts(entry.path()) {
                        return Ok(());
                    }

                    tracing::debug!(path = %entry.path().display(), "indexing");
                    match Document::from_file(entry.path(), &tokenizer) {
                        Ok(doc) => {
                            sink.lock().push(doc);
                            Ok(())
                        }
                        Err(error) if options.policy == LoadPolicy::Strict => {
                            Err(Error::DocumentFailed(Box::new(error)))
                        }
                        Err(error) => {
                            tracing::warn!(
                                path = %entry.path().display(),
                                %error,
                                "skipping document"
                            );
                            failures.lock().push(LoadFailure {
                                path: entry.into_path(),
                                error,
                            });
                            Ok(())
                        }
                    }
                })
        })?;

        self.documents = sink.into_inner();
        self.state = EngineState::Ready;

        let report = LoadReport {
            indexed: self.documents.len(),
            failures: failures.into_inner(),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            indexed = report.indexed,
            skipped = report.failures.len(),
            elapsed = ?report.elapsed,
            "load complete"
        );
        Ok(report)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of documents containing `term`, by a full scan of the corpus
    pub fn count_docs_that_contain_term(&self, term: &str) -> usize {
        self.documents.iter().filter(|doc| doc.contains(term)).count()
    }

    pub fn inverse_document_frequency(&self, term: &str) -> f64 {
        inverse_document_frequency(self.document_count(), self.count_docs_that_contain_term(term))
    }

    /// Paths of the `result_count` most relevant documents for `query`
    pub fn search(&self, query: &str, result_count: usize) -> Vec<String> {
        self.search_scored(query, result_count)
            .into_iter()
            .map(|scored| scored.path)
            .collect()
    }

    /// Like [`Engine::search`], keeping the scores.
    ///
    /// The query is lower-cased and split on whitespace; a repeated term
    /// contributes once per occurrence. Every document is ranked, including
    /// those matching nothing, so asking for at least the corpus size
    /// returns the whole corpus in rank order.
    pub fn search_scored(&self, query: &str, result_count: usize) -> Vec<ScoredDocument> {
        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        if query_terms.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let distinct: HashSet<&String> = query_terms.iter().collect();
        let idf: HashMap<String, f64> = distinct
            .into_iter()
            .map(|term| (term.clone(), self.inverse_document_frequency(term)))
            .collect();

        let mut ranking = rank_documents(&query_terms, &self.documents, &idf);
        ranking.truncate(result_count);

        for scored in &ranking {
            tracing::debug!(path = %scored.path, score = scored.score, "ranked");
        }
        ranking
    }

    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<()> {
        snapshot::save(path.as_ref(), &self.documents)
    }

    /// Replace the whole corpus with the snapshot at `path`.
    ///
    /// On error the engine is left untouched.
    pub fn load_state(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let documents = snapshot::load(path.as_ref())?;
        self.documents = documents;
        self.state = EngineState::Ready;
        Ok(())
    }

    pub fn stats(&self) -> CorpusStats {
        let distinct_terms: HashSet<&String> = self
            .documents
            .iter()
            .flat_map(|doc| doc.term_counts().keys())
            .collect();

        CorpusStats {
            documents: self.documents.len(),
            distinct_terms: distinct_terms.len(),
            total_tokens: self.documents.iter().map(Document::total_tokens).sum(),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engine has {} documents loaded", self.document_count())?;
        for doc in &self.documents {
            writeln!(f, "{doc}")?;
        }
        Ok(())
    }
}

fn traversal_error(root: &Path, reason: impl ToString) -> Error {
    Error::Traversal {
        root: root.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn build_pool(workers: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("sego-loader-{i}"));
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    builder.build().map_err(|e| Error::WorkerPool(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TermCounts;
    use tempfile::tempdir;

    /// Document with `term` repeated `hits` times among `distinct` distinct terms
    fn doc_with(path: &str, term: Option<(&str, u32)>, distinct: usize) -> Document {
        let mut counts = TermCounts::new();
        if let Some((term, hits)) = term {
            counts.insert(term.to_string(), hits);
        }
        let mut filler = 0;
        while counts.len() < distinct {
            counts.insert(format!("{path}filler{filler}"), 1);
            filler += 1;
        }
        Document::new(path.to_string(), counts)
    }

    fn memory_corpus() -> Engine {
        Engine::from_documents(vec![
            doc_with("c.html", None, 5),
            doc_with("b.html", Some(("memory", 1)), 100),
            doc_with("a.html", Some(("memory", 5)), 10),
        ])
        .unwrap()
    }

    #[test]
    fn test_tf_idf_ranking() {
        let engine = memory_corpus();

        assert_eq!(engine.search("memory", 2), vec!["a.html", "b.html"]);

        let scored = engine.search_scored("MEMORY", 3);
        // idf = log10(3 / 3) + 1 = 1
        assert!((scored[0].score - 0.5).abs() < 1e-12);
        assert!((scored[1].score - 0.01).abs() < 1e-12);
        assert_eq!(scored[2].path, "c.html");
        assert_eq!(scored[2].score, 0.0);
    }

    #[test]
    fn test_result_count_at_or_above_corpus_size() {
        let engine = memory_corpus();
        let expected = vec!["a.html", "b.html", "c.html"];
        assert_eq!(engine.search("memory", 3), expected);
        assert_eq!(engine.search("memory", 50), expected);
        assert!(engine.search("memory", 0).is_empty());
    }

    #[test]
    fn test_empty_engine_and_empty_query() {
        let engine = Engine::new();
        assert!(engine.search("anything", 10).is_empty());
        assert_eq!(engine.document_count(), 0);

        let engine = memory_corpus();
        assert!(engine.search("   ", 10).is_empty());
    }

    #[test]
    fn test_unmatched_query_keeps_corpus_order() {
        let engine = memory_corpus();
        assert_eq!(engine.search("scheduler", 3), vec!["c.html", "b.html", "a.html"]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let engine = memory_corpus();
        let first = engine.search("memory filler", 3);
        for _ in 0..10 {
            assert_eq!(engine.search("memory filler", 3), first);
        }
    }

    #[test]
    fn test_count_docs_is_monotonic() {
        let base = vec![doc_with("a", Some(("rcu", 1)), 3), doc_with("b", None, 3)];
        let before = Engine::from_documents(base.clone()).unwrap();

        let mut grown = base;
        grown.push(doc_with("c", Some(("rcu", 2)), 4));
        let after = Engine::from_documents(grown).unwrap();

        assert_eq!(before.count_docs_that_contain_term("rcu"), 1);
        assert_eq!(after.count_docs_that_contain_term("rcu"), 2);
        assert_eq!(after.count_docs_that_contain_term("missing"), 0);
    }

    #[test]
    fn test_duplicate_documents_are_rejected() {
        let docs = vec![doc_with("a", None, 1), doc_with("a", None, 2)];
        let err = Engine::from_documents(docs).unwrap_err();
        assert!(matches!(err, Error::DuplicateDocument(path) if path == "a"));
    }

    #[test]
    fn test_load_walks_tree() -> Result<()> {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("admin-guide/mm");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("index.html"), "<title>Kernel</title><p>memory</p>").unwrap();
        fs::write(nested.join("paging.HTML"), "<h2>Paging</h2><p>memory memory</p>").unwrap();
        fs::write(nested.join("notes.txt"), "<p>memory</p>").unwrap();

        let mut engine = Engine::new();
        let report = engine.load(dir.path(), &LoadOptions::default())?;

        assert_eq!(report.indexed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.count_docs_that_contain_term("memory"), 2);

        let top = engine.search("paging", 1);
        assert_eq!(top.len(), 1);
        assert!(top[0].ends_with("paging.HTML"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_load_does_not_follow_symlinks() -> Result<()> {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("linked.html"), "<p>linked</p>").unwrap();

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("local.html"), "<p>local</p>").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("outside")).unwrap();

        let mut engine = Engine::new();
        engine.load(dir.path(), &LoadOptions::default())?;
        assert_eq!(engine.document_count(), 1);
        assert_eq!(engine.count_docs_that_contain_term("linked"), 0);
        Ok(())
    }

    /// Write a file whose name is not valid UTF-8
    #[cfg(target_os = "linux")]
    fn write_raw_name(dir: &Path, name: &[u8], html: &str) {
        use std::os::unix::ffi::OsStrExt;
        fs::write(dir.join(std::ffi::OsStr::from_bytes(name)), html).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_skips_broken_documents() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.html"), "<p>fine</p>").unwrap();
        write_raw_name(dir.path(), b"bad\xff.html", "<p>fine</p>");

        let mut engine = Engine::new();
        let options = LoadOptions {
            workers: Some(2),
            ..LoadOptions::default()
        };
        let report = engine.load(dir.path(), &options)?;

        assert_eq!(report.indexed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::Parse { .. }));
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_strict_load_aborts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.html"), "<p>fine</p>").unwrap();
        write_raw_name(dir.path(), b"bad\xff.html", "<p>fine</p>");

        let mut engine = Engine::new();
        let options = LoadOptions {
            policy: LoadPolicy::Strict,
            ..LoadOptions::default()
        };
        let err = engine.load(dir.path(), &options).unwrap_err();

        assert!(matches!(err, Error::DocumentFailed(_)));
        assert_eq!(engine.state(), EngineState::Empty);
        assert_eq!(engine.document_count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_keep_paths_unique() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.html"), "<p>memory</p>").unwrap();
        write_raw_name(dir.path(), b"a\xff.html", "<p>memory</p>");
        write_raw_name(dir.path(), b"a\xfe.html", "<p>memory</p>");

        let mut engine = Engine::new();
        let report = engine.load(dir.path(), &LoadOptions::default())?;
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failures.len(), 2);

        let state = dir.path().join("index.json");
        engine.save_state(&state)?;
        let restored = Engine::from_snapshot(&state)?;
        assert_eq!(restored.documents(), engine.documents());
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_content_is_indexed() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("latin1.html"), b"<p>memory caf\xe9 management</p>").unwrap();

        let mut engine = Engine::new();
        let report = engine.load(dir.path(), &LoadOptions::default())?;

        assert_eq!(report.indexed, 1);
        assert!(report.failures.is_empty());
        assert_eq!(engine.count_docs_that_contain_term("memory"), 1);
        Ok(())
    }

    #[test]
    fn test_empty_document_scores_zero() {
        let engine = Engine::from_documents(vec![
            doc_with("empty.html", None, 0),
            doc_with("hit.html", Some(("memory", 2)), 4),
            doc_with("other.html", None, 3),
        ])
        .unwrap();

        let scored = engine.search_scored("memory", 3);
        assert!(scored.iter().all(|doc| doc.score.is_finite()));

        let paths: Vec<&str> = scored.iter().map(|doc| doc.path.as_str()).collect();
        assert_eq!(paths, vec!["hit.html", "empty.html", "other.html"]);
        assert_eq!(scored[1].score, 0.0);
        assert_eq!(engine.search("memory", 3), engine.search("memory", 3));
    }

    #[test]
    fn test_load_missing_root() {
        let mut engine = Engine::new();
        let err = engine
            .load("/no/such/docs", &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Traversal { .. }));
    }

    #[test]
    fn test_second_load_is_rejected() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.html"), "<p>once</p>").unwrap();

        let mut engine = Engine::new();
        engine.load(dir.path(), &LoadOptions::default())?;
        let err = engine.load(dir.path(), &LoadOptions::default()).unwrap_err();

        assert!(matches!(err, Error::AlreadyLoaded(1)));
        assert_eq!(engine.count_docs_that_contain_term("once"), 1);
        Ok(())
    }

    #[test]
    fn test_state_round_trip() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let engine = memory_corpus();
        engine.save_state(&path)?;

        let restored = Engine::from_snapshot(&path)?;
        assert_eq!(restored.documents(), engine.documents());
        assert_eq!(restored.search("memory", 3), engine.search("memory", 3));
        Ok(())
    }

    #[test]
    fn test_failed_restore_keeps_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "not json").unwrap();

        let mut engine = memory_corpus();
        assert!(engine.load_state(&path).is_err());
        assert_eq!(engine.document_count(), 3);
    }

    #[test]
    fn test_stats_and_display() {
        let engine = Engine::from_documents(vec![
            Document::new(
                "x".to_string(),
                [("a".to_string(), 2), ("b".to_string(), 1)].into_iter().collect(),
            ),
            Document::new("y".to_string(), [("b".to_string(), 4)].into_iter().collect()),
        ])
        .unwrap();

        let stats = engine.stats();
        let expected = CorpusStats {
            documents: 2,
            distinct_terms: 2,
            total_tokens: 7,
        };
        assert_eq!(stats, expected);
        assert_eq!(
            engine.to_string(),
            "Engine has 2 documents loaded\nx words: 2\ny words: 1\n"
        );
    }
}
