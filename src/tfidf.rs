use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};
use crate::models::{BagOfWords, SparseVector};

/// The TF-IDF weighting model: one IDF value per vocabulary id.
///
/// A raw count `f` for term `t` becomes `(1 + log10 f) * log10(D / df_t)`,
/// and the resulting document vector is L2-normalized, so the dot product of
/// two transformed vectors is their cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfModel {
    /// IDF per term id; 0.0 for terms never seen during training.
    idf: Vec<f32>,
    num_docs: u64,
}

impl TfIdfModel {
    /// Trains the model by streaming bags-of-words once and accumulating
    /// document frequencies. `num_features` is the vocabulary size V.
    pub fn train<I>(num_features: usize, bows: I) -> Self
    where
        I: IntoIterator<Item = BagOfWords>,
    {
        let mut dfs = vec![0u64; num_features];
        let mut num_docs = 0u64;
        for bow in bows {
            for &(id, _count) in &bow.0 {
                if (id as usize) < num_features {
                    dfs[id as usize] += 1;
                }
            }
            num_docs += 1;
        }
        let idf = dfs
            .iter()
            .map(|&df| {
                if df > 0 {
                    (num_docs as f64 / df as f64).log10() as f32
                } else {
                    0.0
                }
            })
            .collect();
        TfIdfModel { idf, num_docs }
    }

    /// Number of features (V). Must agree with the vocabulary and every
    /// shard matrix in the bundle.
    pub fn features(&self) -> usize {
        self.idf.len()
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    /// Transforms a bag-of-words into an L2-normalized sparse TF-IDF vector.
    /// Terms with zero IDF contribute nothing; if every weight is zero the
    /// zero vector is returned.
    pub fn transform(&self, bow: &BagOfWords) -> SparseVector {
        let mut entries: Vec<(u32, f32)> = Vec::with_capacity(bow.0.len());
        for &(id, count) in &bow.0 {
            if count == 0 {
                continue;
            }
            let idf = match self.idf.get(id as usize) {
                Some(&idf) if idf > 0.0 => idf,
                _ => continue,
            };
            let tf = 1.0 + (count as f64).log10();
            let weight = (tf as f32) * idf;
            if weight > 0.0 {
                entries.push((id, weight));
            }
        }
        let mut vector = SparseVector::new(entries);
        vector.normalize();
        vector
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SearchError::config(format!("cannot read tf-idf model {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::config(format!("malformed tf-idf model: {e}")))
    }
}
