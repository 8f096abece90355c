mod common;

use bioseek::search::{RefineRequest, SearchEngine};

#[test]
fn test_magic_search_routes_to_classified_categories() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    // query_cat is 2: the classifier should pick virology and biochemistry,
    // leaving the nutrition shard untouched
    let response = engine
        .search("coronavirus spike protein", None, false)
        .unwrap();

    assert!(!response.results.is_empty());
    assert_eq!(response.scores.len(), response.results.len());
    assert!(response
        .results
        .iter()
        .all(|paper| paper.category != "nutrition"));
    assert!(response
        .results
        .iter()
        .take(5)
        .any(|paper| paper.category == "virology"));
    assert!(response.scores.iter().all(|&score| score > 0.0));
    for pair in response.scores.windows(2) {
        assert!(pair[0] >= pair[1], "scores must be descending: {pair:?}");
    }
}

#[test]
fn test_explicit_category_searches_only_that_shard() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    // "protein" occurs in virology too; restricting to biochemistry must
    // keep the ranker away from every other shard
    let response = engine
        .search("protein enzyme", Some(&["biochemistry".to_string()]), false)
        .unwrap();

    assert!(!response.results.is_empty());
    assert!(response
        .results
        .iter()
        .all(|paper| paper.category == "biochemistry"));
}

#[test]
fn test_unknown_explicit_category_is_input_error() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let err = engine
        .search("protein", Some(&["astrology".to_string()]), false)
        .unwrap_err();
    assert!(matches!(err, bioseek::SearchError::Input(_)));
}

#[test]
fn test_deep_search_ignores_explicit_categories() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    // categories are ignored under deep search, so virology papers from the
    // all* sub-shards still come back
    let response = engine
        .search("coronavirus", Some(&["biochemistry".to_string()]), true)
        .unwrap();
    assert!(!response.results.is_empty());
    assert!(response
        .results
        .iter()
        .any(|paper| paper.category == "virology"));

    let unconstrained = engine.search("coronavirus", None, true).unwrap();
    assert_eq!(
        serde_json::to_string(&response.results).unwrap(),
        serde_json::to_string(&unconstrained.results).unwrap()
    );
}

#[test]
fn test_search_is_deterministic() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let first = engine.search("spike receptor binding", None, false).unwrap();
    let second = engine.search("spike receptor binding", None, false).unwrap();
    assert_eq!(
        serde_json::to_string(&first.results).unwrap(),
        serde_json::to_string(&second.results).unwrap()
    );
    assert_eq!(first.scores, second.scores);
}

#[test]
fn test_empty_and_stopword_queries_yield_empty_results() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    assert!(engine.search("", None, false).unwrap().results.is_empty());
    assert!(engine
        .search("the of and is", None, false)
        .unwrap()
        .results
        .is_empty());
    assert!(engine
        .search("2021 42", None, false)
        .unwrap()
        .results
        .is_empty());
}

#[test]
fn test_unknown_term_yields_empty_results() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("asdfqwerzxcv", None, false).unwrap();
    assert!(response.results.is_empty());
    assert!(response.scores.is_empty());
}

#[test]
fn test_zero_top_k_yields_empty_results() {
    let (_dir, mut config) = common::fixture();
    config.top_k = 0;
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("coronavirus", None, false).unwrap();
    assert!(response.results.is_empty());
}

#[test]
fn test_max_results_caps_merged_output() {
    let (_dir, mut config) = common::fixture();
    config.max_results = Some(2);
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("coronavirus spike", None, true).unwrap();
    assert!(response.results.len() <= 2);
}

#[test]
fn test_refine_composes_like_intersected_filters() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("coronavirus spike protein", None, true).unwrap();
    assert!(response.results.len() > 2);

    let wide = RefineRequest {
        pubyears: Some((2019, Some(2021))),
        ..RefineRequest::default()
    };
    let narrow = RefineRequest {
        pubyears: Some((2020, Some(2021))),
        ..RefineRequest::default()
    };

    let chained = SearchEngine::refine_at(
        &SearchEngine::refine_at(&response.results, &wide, 2023)
            .unwrap()
            .results,
        &narrow,
        2023,
    )
    .unwrap();
    let direct = SearchEngine::refine_at(&response.results, &narrow, 2023).unwrap();
    assert_eq!(
        serde_json::to_string(&chained.results).unwrap(),
        serde_json::to_string(&direct.results).unwrap()
    );
}

#[test]
fn test_refine_never_reorders_cached_results() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("coronavirus spike protein", None, true).unwrap();
    let request = RefineRequest {
        journals: Some(vec![
            "Journal of Virology".to_string(),
            "Nature".to_string(),
        ]),
        ..RefineRequest::default()
    };
    let refined = SearchEngine::refine_at(&response.results, &request, 2023).unwrap();

    // Filtered output must be a subsequence of the original ranking
    let original: Vec<&str> = response.results.iter().map(|r| r.doi.as_str()).collect();
    let mut cursor = 0;
    for paper in &refined.results {
        let position = original[cursor..]
            .iter()
            .position(|&doi| doi == paper.doi)
            .expect("refined result missing from original ranking");
        cursor += position + 1;
    }
}

#[test]
fn test_facets_come_from_ranked_list() {
    let (_dir, config) = common::fixture();
    let engine = SearchEngine::load(config).unwrap();

    let response = engine.search("coronavirus spike", None, false).unwrap();
    let facets = SearchEngine::build_facets(&response.results);
    assert!(!facets.journals.is_empty());
    assert_eq!(facets.journals[0], response.results[0].journal_name);
    assert_eq!(facets.pubyears[0], response.results[0].year);
}
