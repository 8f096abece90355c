use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::warn;

use crate::classifier::NaiveBayesClassifier;
use crate::errors::{Result, SearchError};
use crate::models::{ScoredHit, SparseVector};
use crate::search::deadline::Deadline;
use crate::search::similarity::cosine_topk;
use crate::shard::ShardStore;

/// The name expanded for deep search.
pub const DEEP_CATEGORY: &str = "all";

/// Decides which shards a query goes to and runs the fan-out.
#[derive(Debug, Clone)]
pub struct QueryRouter {
    /// How many classified categories a magic search targets.
    pub query_cat: usize,
    /// Per-shard result budget.
    pub top_k: usize,
}

impl QueryRouter {
    pub fn new(query_cat: usize, top_k: usize) -> Self {
        QueryRouter { query_cat, top_k }
    }

    /// Resolves the target shard list.
    ///
    /// Deep search always targets the `all*` sub-shards and ignores any
    /// explicit categories (with a warning). An explicit category list is
    /// expanded as given. Otherwise the classifier ranks categories and the
    /// top `query_cat` are taken; if the classifier fails, the query falls
    /// back to the deep set rather than erroring out.
    pub fn resolve_targets(
        &self,
        store: &ShardStore,
        classifier: &NaiveBayesClassifier,
        query: &SparseVector,
        categories: Option<&[String]>,
        deep: bool,
    ) -> Result<Vec<String>> {
        if deep {
            if categories.is_some_and(|c| !c.is_empty()) {
                warn!("deep search requested; explicit categories are ignored");
            }
            return store.expand(DEEP_CATEGORY);
        }

        if let Some(categories) = categories.filter(|c| !c.is_empty()) {
            let mut targets = Vec::new();
            for category in categories {
                for shard in store.expand(category)? {
                    if !targets.contains(&shard) {
                        targets.push(shard);
                    }
                }
            }
            return Ok(targets);
        }

        let dense = query.to_dense(classifier.num_features() as usize);
        let ranked = match classifier.predict_proba(&dense) {
            Ok(probs) => {
                let mut ranked: Vec<(f64, &str)> = probs
                    .into_iter()
                    .zip(classifier.labels())
                    .map(|(p, label)| (p, label.as_str()))
                    .collect();
                ranked.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.1.cmp(b.1))
                });
                ranked
            }
            Err(e) => {
                warn!("query classification failed ({e}); falling back to deep search");
                return store.expand(DEEP_CATEGORY);
            }
        };

        let mut targets = Vec::new();
        for (_, label) in ranked.into_iter().take(self.query_cat) {
            for shard in store.expand(label)? {
                if !targets.contains(&shard) {
                    targets.push(shard);
                }
            }
        }
        Ok(targets)
    }

    /// Searches every target shard in parallel with the per-shard budget.
    ///
    /// A shard that fails to read contributes nothing (with a warning) so a
    /// single bad shard cannot poison the query; deadline expiry aborts the
    /// whole fan-out and discards partial results.
    pub fn fan_out(
        &self,
        store: &ShardStore,
        query: &SparseVector,
        targets: &[String],
        deadline: &Deadline,
    ) -> Result<Vec<ScoredHit>> {
        let per_shard: Vec<Result<Vec<ScoredHit>>> = targets
            .par_iter()
            .map(|name| {
                deadline.check()?;
                let shard = store.get(name).ok_or_else(|| {
                    SearchError::input(format!("unknown category: {name}"))
                })?;
                let hits = cosine_topk(query, shard, self.top_k, deadline)?;
                Ok(hits
                    .into_iter()
                    .map(|(docid, score)| ScoredHit {
                        shard: name.clone(),
                        docid,
                        score,
                    })
                    .collect())
            })
            .collect();

        let mut merged = Vec::new();
        for (name, outcome) in targets.iter().zip(per_shard) {
            match outcome {
                Ok(hits) => merged.extend(hits),
                Err(e @ SearchError::Timeout(_)) => return Err(e),
                Err(e) => warn!("shard {name} failed: {e}; continuing without it"),
            }
        }
        Ok(merged)
    }

    /// Globally orders merged hits by descending score, breaking ties by
    /// ascending (shard name, docid), and truncates to `limit` when given.
    pub fn merge(mut hits: Vec<ScoredHit>, limit: Option<usize>) -> Vec<ScoredHit> {
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.shard.cmp(&b.shard))
                .then_with(|| a.docid.cmp(&b.docid))
        });
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(shard: &str, docid: u32, score: f32) -> ScoredHit {
        ScoredHit {
            shard: shard.to_string(),
            docid,
            score,
        }
    }

    #[test]
    fn test_merge_orders_by_score_then_shard_then_docid() {
        let merged = QueryRouter::merge(
            vec![
                hit("b", 0, 0.5),
                hit("a", 7, 0.5),
                hit("a", 2, 0.5),
                hit("c", 1, 0.9),
                hit("a", 3, 0.1),
            ],
            None,
        );
        assert_eq!(
            merged,
            vec![
                hit("c", 1, 0.9),
                hit("a", 2, 0.5),
                hit("a", 7, 0.5),
                hit("b", 0, 0.5),
                hit("a", 3, 0.1),
            ]
        );
    }

    #[test]
    fn test_merge_truncates_to_limit() {
        let merged = QueryRouter::merge(
            vec![hit("a", 0, 0.3), hit("a", 1, 0.2), hit("a", 2, 0.1)],
            Some(2),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].docid, 0);
    }
}
