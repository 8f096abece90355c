use std::time::Duration;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::NaiveBayesClassifier;
use crate::config::EngineConfig;
use crate::errors::{Result, SearchError};
use crate::models::{Facets, PaperMetadata, SearchResponse};
use crate::search::deadline::Deadline;
use crate::search::followup::FollowUpIndex;
use crate::search::router::QueryRouter;
use crate::search::tokenization::tokenize;
use crate::shard::ShardStore;
use crate::tfidf::TfIdfModel;
use crate::vocabulary::Vocabulary;

/// Follow-up filters applied to a cached result list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journals: Option<Vec<String>>,
    /// `(lo, hi)`; an absent `hi` means "up to the current year".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubyears: Option<(i32, Option<i32>)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefineResponse {
    pub results: Vec<PaperMetadata>,
    pub facets: Facets,
}

/// The public face of the engine: `search`, `build_facets`, `refine`.
///
/// Holds the read-only model bundle (vocabulary, TF-IDF model, classifier,
/// shard store) loaded once at startup. The handle is re-entrant: all
/// per-query state lives on the calling thread, so one engine serves
/// concurrent queries without locks. Reloading means building a new engine
/// and swapping the shared reference.
///
/// Caching contract: callers key their cache on `(query, deep)` — see
/// [`SearchEngine::cache_key`] — and store the unfiltered `results` array
/// from [`SearchEngine::search`]. [`SearchEngine::refine`] and
/// [`SearchEngine::build_facets`] are associated functions that only touch
/// the list they are given, never the shard store, so filter latency is
/// independent of corpus size.
#[derive(Debug)]
pub struct SearchEngine {
    config: EngineConfig,
    vocabulary: Vocabulary,
    tfidf: TfIdfModel,
    classifier: NaiveBayesClassifier,
    store: ShardStore,
    router: QueryRouter,
}

impl SearchEngine {
    /// Loads the model bundle described by the config. Every artifact must
    /// agree on the number of features V; any disagreement or missing file
    /// is a config error and the process should not serve queries.
    pub fn load(config: EngineConfig) -> Result<Self> {
        let vocabulary = Vocabulary::load(&config.vocab_path())?;
        let tfidf = TfIdfModel::load(&config.tfidf_path())?;
        let classifier = NaiveBayesClassifier::load(&config.classifier_path())?;
        let store = ShardStore::open(&config.shards_dir())?;

        let v = vocabulary.size();
        if tfidf.features() != v {
            return Err(SearchError::config(format!(
                "tf-idf model has {} features but vocabulary has {v}",
                tfidf.features()
            )));
        }
        if classifier.num_features() as usize != v {
            return Err(SearchError::config(format!(
                "classifier has {} features but vocabulary has {v}",
                classifier.num_features()
            )));
        }
        let shard_features = store.num_features()?;
        if shard_features as usize != v {
            return Err(SearchError::config(format!(
                "shards have {shard_features} features but vocabulary has {v}"
            )));
        }

        info!(
            features = v,
            shards = store.categories().count(),
            "model bundle loaded"
        );
        let router = QueryRouter::new(config.query_cat, config.top_k);
        Ok(SearchEngine {
            config,
            vocabulary,
            tfidf,
            classifier,
            store,
            router,
        })
    }

    /// The cache key a stateless front-end should use for a search's
    /// unfiltered result list.
    pub fn cache_key(query: &str, deep: bool) -> String {
        format!("{query}{deep}")
    }

    /// Runs the full query pipeline and returns scored, ranked metadata.
    ///
    /// An empty query, or one whose terms are all unknown or stopped,
    /// yields an empty response without touching any shard.
    pub fn search(
        &self,
        query: &str,
        categories: Option<&[String]>,
        deep: bool,
    ) -> Result<SearchResponse> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(SearchResponse::default());
        }
        let bow = self.vocabulary.doc_to_bow(&tokens);
        let vector = self.tfidf.transform(&bow);
        if vector.is_empty() {
            return Ok(SearchResponse::default());
        }

        let deadline = Deadline::within(Duration::from_millis(self.config.deadline_ms));
        let targets =
            self.router
                .resolve_targets(&self.store, &self.classifier, &vector, categories, deep)?;
        debug!(?targets, "query routed");

        let hits = self.router.fan_out(&self.store, &vector, &targets, &deadline)?;
        let merged = QueryRouter::merge(hits, self.config.max_results);

        let mut scores = Vec::with_capacity(merged.len());
        let mut results = Vec::with_capacity(merged.len());
        for hit in merged {
            let shard = self.store.get(&hit.shard).ok_or_else(|| {
                SearchError::Internal(anyhow::anyhow!("shard {} vanished", hit.shard))
            })?;
            scores.push(hit.score);
            results.push(shard.meta(hit.docid as usize)?);
        }
        Ok(SearchResponse { scores, results })
    }

    /// Facets over a (possibly cached) ranked result list.
    pub fn build_facets(results: &[PaperMetadata]) -> Facets {
        FollowUpIndex::new(results.to_vec()).facets()
    }

    /// Applies follow-up filters to a ranked result list, preserving the
    /// original rank. Facets are computed over the incoming list so the
    /// caller can keep offering the full filter menu.
    pub fn refine(results: &[PaperMetadata], request: &RefineRequest) -> Result<RefineResponse> {
        Self::refine_at(results, request, chrono::Utc::now().year())
    }

    /// Same as [`SearchEngine::refine`] with the current year injected, so
    /// open-ended year ranges are testable against a frozen clock.
    pub fn refine_at(
        results: &[PaperMetadata],
        request: &RefineRequest,
        current_year: i32,
    ) -> Result<RefineResponse> {
        let index = FollowUpIndex::new(results.to_vec());
        let facets = index.facets();

        let mut filtered = results.to_vec();
        if let Some(categories) = request.categories.as_deref().filter(|c| !c.is_empty()) {
            filtered = FollowUpIndex::new(filtered).filter_by_categories(categories);
        }
        if let Some(journals) = request.journals.as_deref().filter(|j| !j.is_empty()) {
            filtered = FollowUpIndex::new(filtered).filter_by_journals(journals);
        }
        if let Some((lo, hi)) = request.pubyears {
            filtered = FollowUpIndex::new(filtered).filter_by_years(lo, hi, current_year)?;
        }

        Ok(RefineResponse {
            results: filtered,
            facets,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn classifier(&self) -> &NaiveBayesClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }
}
