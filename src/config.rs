//! Runtime configuration.
//!
//! Defaults can be replaced by a JSON file (`--config`), and individual
//! values by command line flags or `SEGO_*` environment variables.

use crate::engine::{LoadOptions, LoadPolicy};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the extracted documentation tree
pub const DEFAULT_DOCS_DIR: &str = "linux-kernel-docs";
/// Snapshot written by `index` and read by `search` / `serve`
pub const DEFAULT_STATE_PATH: &str = "index.json";
pub const DEFAULT_PORT: u16 = 4000;
/// Results returned when a query does not ask for a count
pub const DEFAULT_RESULT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub docs_dir: PathBuf,
    pub state_path: PathBuf,
    pub port: u16,
    pub default_result_count: usize,
    pub workers: Option<usize>,
    pub extensions: Vec<String>,
    pub policy: LoadPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let load = LoadOptions::default();
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            port: DEFAULT_PORT,
            default_result_count: DEFAULT_RESULT_COUNT,
            workers: load.workers,
            extensions: load.extensions,
            policy: load.policy,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            policy: self.policy,
            workers: self.workers,
            extensions: self.extensions.clone(),
        }
    }
}
