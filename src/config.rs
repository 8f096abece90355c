use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};

fn default_top_k() -> usize {
    20
}

fn default_query_cat() -> usize {
    3
}

fn default_deadline_ms() -> u64 {
    30_000
}

/// Engine configuration: where the frozen model bundle lives and the query
/// tuning knobs. All fields besides the index directory have defaults, so a
/// partial JSON config (or none at all) works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `vocab.bin`, `tfidf.bin`, `classifier.bin` and the
    /// `shards/` subdirectory.
    pub index_dir: PathBuf,

    /// Per-shard result budget during fan-out.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many classified categories a magic search targets.
    #[serde(default = "default_query_cat")]
    pub query_cat: usize,

    /// Global cap on merged results; `None` returns everything the fan-out
    /// produced.
    #[serde(default)]
    pub max_results: Option<usize>,

    /// Per-query deadline in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl EngineConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        EngineConfig {
            index_dir: index_dir.into(),
            top_k: default_top_k(),
            query_cat: default_query_cat(),
            max_results: None,
            deadline_ms: default_deadline_ms(),
        }
    }

    /// Reads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SearchError::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::config(format!("malformed config: {e}")))
    }

    /// Applies `BIOSEEK_*` environment overrides on top of the current
    /// values. Unparseable values are a config error rather than silently
    /// ignored.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(value) = env::var("BIOSEEK_INDEX_DIR") {
            self.index_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var("BIOSEEK_TOP_K") {
            self.top_k = value
                .parse()
                .map_err(|_| SearchError::config(format!("bad BIOSEEK_TOP_K: {value}")))?;
        }
        if let Ok(value) = env::var("BIOSEEK_QUERY_CAT") {
            self.query_cat = value
                .parse()
                .map_err(|_| SearchError::config(format!("bad BIOSEEK_QUERY_CAT: {value}")))?;
        }
        if let Ok(value) = env::var("BIOSEEK_DEADLINE_MS") {
            self.deadline_ms = value
                .parse()
                .map_err(|_| SearchError::config(format!("bad BIOSEEK_DEADLINE_MS: {value}")))?;
        }
        Ok(self)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.index_dir.join("vocab.bin")
    }

    pub fn tfidf_path(&self) -> PathBuf {
        self.index_dir.join("tfidf.bin")
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.index_dir.join("classifier.bin")
    }

    pub fn shards_dir(&self) -> PathBuf {
        self.index_dir.join("shards")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new("/tmp/index");
        assert_eq!(config.top_k, 20);
        assert_eq!(config.query_cat, 3);
        assert_eq!(config.deadline_ms, 30_000);
        assert!(config.max_results.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"index_dir": "/data/index", "top_k": 50}"#).unwrap();
        assert_eq!(config.index_dir, PathBuf::from("/data/index"));
        assert_eq!(config.top_k, 50);
        assert_eq!(config.query_cat, 3);
    }

    #[test]
    fn test_artifact_paths() {
        let config = EngineConfig::new("/data/index");
        assert_eq!(config.vocab_path(), PathBuf::from("/data/index/vocab.bin"));
        assert_eq!(config.shards_dir(), PathBuf::from("/data/index/shards"));
    }
}
