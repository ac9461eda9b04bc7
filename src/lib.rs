// Re-export main components
pub mod api;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod ranking;
pub mod snapshot;
pub mod tokenizer;

// Re-export commonly used types
pub use config::Config;
pub use document::Document;
pub use engine::{
    CorpusStats, Engine, EngineState, LoadFailure, LoadOptions, LoadPolicy, LoadReport,
};
pub use ranking::{term_frequency, ScoredDocument};
pub use tokenizer::{TermCounts, Tokenizer};

// Re-export error types
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
