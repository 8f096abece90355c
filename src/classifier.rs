use std::f64::consts::PI;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SearchError};
use crate::models::SparseVector;
use crate::shard::ShardStore;

/// Gaussian naive-Bayes classifier over dense TF-IDF query vectors.
///
/// Per class the payload stores a log prior and sparse mean/variance
/// vectors; features absent from a class's vectors have mean 0 and the
/// smoothing variance. The label list is sorted, and one category is left
/// out of it, reachable only through explicit routing; `excluded_label`
/// records which.
#[derive(Debug, Serialize, Deserialize)]
pub struct NaiveBayesClassifier {
    labels: Vec<String>,
    excluded_label: Option<String>,
    num_features: u32,
    var_smoothing: f64,
    class_log_prior: Vec<f64>,
    means: Vec<SparseVector>,
    variances: Vec<SparseVector>,
    /// Per-class log likelihood of the all-zeros vector, computed on first
    /// use so predictions only pay for the query's nonzeros.
    #[serde(skip)]
    zero_log_likelihood: OnceCell<Vec<f64>>,
}

impl NaiveBayesClassifier {
    pub fn from_parts(
        labels: Vec<String>,
        excluded_label: Option<String>,
        num_features: u32,
        var_smoothing: f64,
        class_log_prior: Vec<f64>,
        means: Vec<SparseVector>,
        variances: Vec<SparseVector>,
    ) -> Result<Self> {
        if labels.len() != class_log_prior.len()
            || labels.len() != means.len()
            || labels.len() != variances.len()
        {
            return Err(SearchError::config(
                "classifier payload: per-class arrays disagree on class count",
            ));
        }
        if !labels.windows(2).all(|w| w[0] < w[1]) {
            return Err(SearchError::config(
                "classifier payload: labels must be sorted and distinct",
            ));
        }
        if means.iter().zip(&variances).any(|(m, v)| m.len() != v.len()) {
            return Err(SearchError::config(
                "classifier payload: mean and variance vectors are misaligned",
            ));
        }
        Ok(NaiveBayesClassifier {
            labels,
            excluded_label,
            num_features,
            var_smoothing,
            class_log_prior,
            means,
            variances,
            zero_log_likelihood: OnceCell::new(),
        })
    }

    /// Fits the classifier from the shard store: one class per label, with
    /// diagonal Gaussians estimated over that shard's document vectors.
    pub fn train(
        store: &ShardStore,
        labels: &[String],
        excluded_label: Option<String>,
        var_smoothing: f64,
    ) -> Result<Self> {
        let num_features = store.num_features()?;
        let mut sorted_labels: Vec<String> = labels.to_vec();
        sorted_labels.sort();
        sorted_labels.dedup();

        let mut class_counts = Vec::with_capacity(sorted_labels.len());
        let mut means = Vec::with_capacity(sorted_labels.len());
        let mut variances = Vec::with_capacity(sorted_labels.len());

        for label in &sorted_labels {
            let shard = store
                .get(label)
                .ok_or_else(|| SearchError::config(format!("no shard for class {label}")))?;
            let n = shard.len();
            if n == 0 {
                return Err(SearchError::config(format!("class {label} has no documents")));
            }
            // Sparse accumulation: features a class never sees keep mean 0
            let mut sums: ahash::AHashMap<u32, (f64, f64)> = ahash::AHashMap::new();
            for k in 0..n {
                for &(id, w) in shard.row(k)?.iter() {
                    let entry = sums.entry(id).or_insert((0.0, 0.0));
                    entry.0 += w as f64;
                    entry.1 += (w as f64) * (w as f64);
                }
            }
            let mut mean_entries = Vec::with_capacity(sums.len());
            let mut var_entries = Vec::with_capacity(sums.len());
            for (id, (sum, sum_sq)) in sums {
                let mean = sum / n as f64;
                let var = (sum_sq / n as f64 - mean * mean).max(0.0) + var_smoothing;
                mean_entries.push((id, mean as f32));
                var_entries.push((id, var as f32));
            }
            means.push(SparseVector::new(mean_entries));
            variances.push(SparseVector::new(var_entries));
            class_counts.push(n as f64);
        }

        let total: f64 = class_counts.iter().sum();
        let class_log_prior = class_counts.iter().map(|&n| (n / total).ln()).collect();

        Self::from_parts(
            sorted_labels,
            excluded_label,
            num_features,
            var_smoothing,
            class_log_prior,
            means,
            variances,
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn excluded_label(&self) -> Option<&str> {
        self.excluded_label.as_deref()
    }

    pub fn num_features(&self) -> u32 {
        self.num_features
    }

    fn lookup(vector: &SparseVector, id: u32) -> Option<f32> {
        vector
            .0
            .binary_search_by_key(&id, |e| e.0)
            .ok()
            .map(|idx| vector.0[idx].1)
    }

    /// log N(x | mean, var), full term including the normalization constant
    /// so the zero baseline and the per-feature deltas agree.
    fn log_pdf(x: f64, mean: f64, var: f64) -> f64 {
        -0.5 * ((2.0 * PI * var).ln() + (x - mean) * (x - mean) / var)
    }

    fn zero_baseline(&self) -> &Vec<f64> {
        self.zero_log_likelihood.get_or_init(|| {
            (0..self.labels.len())
                .map(|c| {
                    let stored = &self.means[c];
                    let vars = &self.variances[c];
                    let mut sum = 0.0;
                    for (idx, &(_, mean)) in stored.0.iter().enumerate() {
                        let var = vars.0[idx].1 as f64;
                        sum += Self::log_pdf(0.0, mean as f64, var);
                    }
                    let absent = self.num_features as usize - stored.len();
                    sum + absent as f64 * Self::log_pdf(0.0, 0.0, self.var_smoothing)
                })
                .collect()
        })
    }

    /// Posterior probability per class, aligned with `labels()`. The query
    /// is the TF-IDF vector expanded to length V.
    pub fn predict_proba(&self, dense: &[f32]) -> Result<Vec<f64>> {
        if dense.len() != self.num_features as usize {
            return Err(SearchError::input(format!(
                "classifier expects {} features, got {}",
                self.num_features,
                dense.len()
            )));
        }
        let baseline = self.zero_baseline();
        let mut joint: Vec<f64> = Vec::with_capacity(self.labels.len());
        for c in 0..self.labels.len() {
            let mut ll = self.class_log_prior[c] + baseline[c];
            for (id, &x) in dense.iter().enumerate() {
                if x == 0.0 {
                    continue;
                }
                let id = id as u32;
                let (mean, var) = match Self::lookup(&self.means[c], id) {
                    Some(mean) => (
                        mean as f64,
                        Self::lookup(&self.variances[c], id).unwrap_or(1.0) as f64,
                    ),
                    None => (0.0, self.var_smoothing),
                };
                ll += Self::log_pdf(x as f64, mean, var) - Self::log_pdf(0.0, mean, var);
            }
            joint.push(ll);
        }
        // Normalize with log-sum-exp for numerical stability
        let max = joint.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let denom: f64 = joint.iter().map(|&j| (j - max).exp()).sum();
        Ok(joint.iter().map(|&j| (j - max).exp() / denom).collect())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SearchError::config(format!("cannot read classifier {}: {e}", path.display()))
        })?;
        let classifier: NaiveBayesClassifier = serde_json::from_slice(&bytes)
            .map_err(|e| SearchError::config(format!("malformed classifier file: {e}")))?;
        if classifier.labels.len() != classifier.means.len()
            || classifier.labels.len() != classifier.class_log_prior.len()
        {
            return Err(SearchError::config(
                "classifier payload: per-class arrays disagree on class count",
            ));
        }
        Ok(classifier)
    }
}
