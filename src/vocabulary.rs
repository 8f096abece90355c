use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};
use crate::models::BagOfWords;

/// Pruning parameters for vocabulary construction.
///
/// A term is kept only while its document frequency lies in
/// `[no_below, no_above * D]`, where `D` is the number of documents seen at
/// pruning time. When more than `keep_n` candidates survive, the `keep_n`
/// with the highest document frequency are retained, ties broken by
/// lexicographic term order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneParams {
    pub no_below: u32,
    pub no_above: f64,
    pub keep_n: usize,
    /// Prune every this many documents, and once more when the stream ends.
    pub prune_at: u64,
}

impl Default for PruneParams {
    fn default() -> Self {
        PruneParams {
            no_below: 2,
            no_above: 0.5,
            keep_n: 300_000,
            prune_at: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermEntry {
    term: String,
    df: u32,
}

/// Serialized form of the vocabulary (`vocab.bin`).
#[derive(Debug, Serialize, Deserialize)]
struct VocabularyFile {
    num_docs: u64,
    terms: Vec<TermEntry>,
}

/// A bijection between stemmed terms and dense integer ids in `[0, V)`,
/// together with the per-term document frequency observed during
/// construction. Immutable once built; the query path only calls
/// [`Vocabulary::doc_to_bow`].
#[derive(Debug, Clone)]
pub struct Vocabulary {
    term_to_id: AHashMap<String, u32>,
    terms: Vec<TermEntry>,
    num_docs: u64,
}

impl Vocabulary {
    /// Number of distinct terms (V).
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    /// Number of documents seen during construction.
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    pub fn id(&self, term: &str) -> Option<u32> {
        self.term_to_id.get(term).copied()
    }

    pub fn term(&self, id: u32) -> Option<&str> {
        self.terms.get(id as usize).map(|e| e.term.as_str())
    }

    /// Document frequency for a term id.
    pub fn df(&self, id: u32) -> Option<u32> {
        self.terms.get(id as usize).map(|e| e.df)
    }

    /// Counts term occurrences and maps them to ids. Terms unknown to the
    /// vocabulary are silently dropped; no positional information survives.
    pub fn doc_to_bow(&self, tokens: &[String]) -> BagOfWords {
        let mut counts: AHashMap<u32, u32> = AHashMap::new();
        for token in tokens {
            if let Some(&id) = self.term_to_id.get(token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut entries: Vec<(u32, u32)> = counts.into_iter().collect();
        entries.sort_by_key(|&(id, _)| id);
        BagOfWords(entries)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = VocabularyFile {
            num_docs: self.num_docs,
            terms: self.terms.clone(),
        };
        let json = serde_json::to_vec(&file)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SearchError::config(format!("cannot read vocabulary {}: {e}", path.display()))
        })?;
        let file: VocabularyFile = serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::config(format!("malformed vocabulary file: {e}")))?;
        Ok(Self::from_entries(file.terms, file.num_docs))
    }

    fn from_entries(terms: Vec<TermEntry>, num_docs: u64) -> Self {
        let term_to_id = terms
            .iter()
            .enumerate()
            .map(|(id, e)| (e.term.clone(), id as u32))
            .collect();
        Vocabulary {
            term_to_id,
            terms,
            num_docs,
        }
    }
}

/// Streaming vocabulary construction: feed tokenized documents one at a
/// time, prune periodically, then [`VocabularyBuilder::finish`].
#[derive(Debug)]
pub struct VocabularyBuilder {
    dfs: AHashMap<String, u32>,
    num_docs: u64,
    params: PruneParams,
}

impl VocabularyBuilder {
    pub fn new(params: PruneParams) -> Self {
        VocabularyBuilder {
            dfs: AHashMap::new(),
            num_docs: 0,
            params,
        }
    }

    /// Registers one document's tokens. Each distinct term counts once
    /// toward its document frequency.
    pub fn add_document(&mut self, tokens: &[String]) {
        let mut seen: ahash::AHashSet<&str> = ahash::AHashSet::new();
        for token in tokens {
            if seen.insert(token.as_str()) {
                *self.dfs.entry(token.clone()).or_insert(0) += 1;
            }
        }
        self.num_docs += 1;
        if self.params.prune_at > 0 && self.num_docs % self.params.prune_at == 0 {
            self.prune();
        }
    }

    /// Applies the frequency bounds and the `keep_n` cap against the
    /// documents seen so far.
    fn prune(&mut self) {
        let max_df = (self.params.no_above * self.num_docs as f64).floor() as u32;
        let no_below = self.params.no_below;
        self.dfs.retain(|_, df| *df >= no_below && *df <= max_df);

        if self.dfs.len() > self.params.keep_n {
            let mut ranked: Vec<(String, u32)> =
                self.dfs.drain().collect();
            // Highest document frequency first; ties resolve lexicographically
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(self.params.keep_n);
            self.dfs = ranked.into_iter().collect();
        }
    }

    /// Final prune, then freeze the id assignment. Ids are dense and
    /// assigned in lexicographic term order so construction is deterministic
    /// regardless of document order.
    pub fn finish(mut self) -> Vocabulary {
        self.prune();
        let mut terms: Vec<TermEntry> = self
            .dfs
            .into_iter()
            .map(|(term, df)| TermEntry { term, df })
            .collect();
        terms.sort_by(|a, b| a.term.cmp(&b.term));
        Vocabulary::from_entries(terms, self.num_docs)
    }
}
