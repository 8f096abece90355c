use ahash::AHashMap;

use crate::errors::{Result, SearchError};
use crate::models::{Facets, PaperMetadata};

/// Secondary indices over an already-ranked result list, for follow-up
/// filtering without re-running the ranker.
///
/// Positions are indices into the original list, so every filter preserves
/// the original rank order. The indices are derived views: build, filter,
/// discard. Chaining works by constructing a new index over a filtered
/// list.
#[derive(Debug)]
pub struct FollowUpIndex {
    results: Vec<PaperMetadata>,
    year_order: Vec<i32>,
    by_year: AHashMap<i32, Vec<usize>>,
    journal_order: Vec<String>,
    by_journal: AHashMap<String, Vec<usize>>,
    category_order: Vec<String>,
    by_category: AHashMap<String, Vec<usize>>,
}

impl FollowUpIndex {
    pub fn new(results: Vec<PaperMetadata>) -> Self {
        let mut year_order = Vec::new();
        let mut by_year: AHashMap<i32, Vec<usize>> = AHashMap::new();
        let mut journal_order = Vec::new();
        let mut by_journal: AHashMap<String, Vec<usize>> = AHashMap::new();
        let mut category_order = Vec::new();
        let mut by_category: AHashMap<String, Vec<usize>> = AHashMap::new();

        for (position, result) in results.iter().enumerate() {
            let year_slot = by_year.entry(result.year).or_default();
            if year_slot.is_empty() {
                year_order.push(result.year);
            }
            year_slot.push(position);

            let journal_slot = by_journal.entry(result.journal_name.clone()).or_default();
            if journal_slot.is_empty() {
                journal_order.push(result.journal_name.clone());
            }
            journal_slot.push(position);

            if !result.category.is_empty() {
                let category_slot = by_category.entry(result.category.clone()).or_default();
                if category_slot.is_empty() {
                    category_order.push(result.category.clone());
                }
                category_slot.push(position);
            }
        }

        FollowUpIndex {
            results,
            year_order,
            by_year,
            journal_order,
            by_journal,
            category_order,
            by_category,
        }
    }

    pub fn results(&self) -> &[PaperMetadata] {
        &self.results
    }

    /// Facet key sets in first-occurrence order, which is descending
    /// relevance because the underlying list is ranked.
    pub fn facets(&self) -> Facets {
        Facets {
            pubyears: self.year_order.clone(),
            journals: self.journal_order.clone(),
            categories: self.category_order.clone(),
        }
    }

    fn select(&self, mut positions: Vec<usize>) -> Vec<PaperMetadata> {
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .map(|p| self.results[p].clone())
            .collect()
    }

    /// Keeps results whose year falls in `[lo, hi]`; an open upper bound
    /// means "up to the current year". Original rank is preserved.
    pub fn filter_by_years(
        &self,
        lo: i32,
        hi: Option<i32>,
        current_year: i32,
    ) -> Result<Vec<PaperMetadata>> {
        let hi = hi.unwrap_or(current_year);
        if lo > hi {
            return Err(SearchError::input(format!(
                "year range {lo}..{hi} is inverted"
            )));
        }
        let mut years: Vec<i32> = self
            .by_year
            .keys()
            .copied()
            .filter(|y| (lo..=hi).contains(y))
            .collect();
        years.sort_unstable();
        let mut positions = Vec::new();
        for year in years {
            positions.extend_from_slice(&self.by_year[&year]);
        }
        Ok(self.select(positions))
    }

    /// Keeps results published in any of the given journals. A document
    /// appears at most once even if the journal set would hit it twice, and
    /// original rank is preserved across the whole selection.
    pub fn filter_by_journals(&self, journals: &[String]) -> Vec<PaperMetadata> {
        let mut positions = Vec::new();
        for journal in journals {
            if let Some(hits) = self.by_journal.get(journal) {
                positions.extend_from_slice(hits);
            }
        }
        self.select(positions)
    }

    /// Keeps results belonging to any of the given categories.
    pub fn filter_by_categories(&self, categories: &[String]) -> Vec<PaperMetadata> {
        let mut positions = Vec::new();
        for category in categories {
            if let Some(hits) = self.by_category.get(category) {
                positions.extend_from_slice(hits);
            }
        }
        self.select(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(n: usize, journal: &str, year: i32, category: &str) -> PaperMetadata {
        PaperMetadata {
            doi: format!("10.1/{n}"),
            title: format!("paper {n}"),
            doi_url: format!("https://doi.org/10.1/{n}"),
            journal_name: journal.to_string(),
            year,
            category: category.to_string(),
            ..PaperMetadata::default()
        }
    }

    fn ranked_list() -> Vec<PaperMetadata> {
        // Journals follow the pattern A,B,A,C,A,B,D,A,C,B over ten ranks
        let journals = ["A", "B", "A", "C", "A", "B", "D", "A", "C", "B"];
        journals
            .iter()
            .enumerate()
            .map(|(n, j)| paper(n, j, 2015 + n as i32, "virology"))
            .collect()
    }

    fn dois(results: &[PaperMetadata]) -> Vec<String> {
        results.iter().map(|r| r.doi.clone()).collect()
    }

    #[test]
    fn test_journal_filter_preserves_rank() {
        let index = FollowUpIndex::new(ranked_list());
        let filtered =
            index.filter_by_journals(&["A".to_string(), "C".to_string()]);
        assert_eq!(
            dois(&filtered),
            vec!["10.1/0", "10.1/2", "10.1/3", "10.1/4", "10.1/7", "10.1/8"]
        );
    }

    #[test]
    fn test_journal_filter_deduplicates_on_position() {
        let index = FollowUpIndex::new(ranked_list());
        // Same journal listed twice must not duplicate documents
        let filtered =
            index.filter_by_journals(&["D".to_string(), "D".to_string()]);
        assert_eq!(dois(&filtered), vec!["10.1/6"]);
    }

    #[test]
    fn test_year_filter_with_open_upper_bound() {
        let years = [2020, 2019, 2021, 2010];
        let list: Vec<PaperMetadata> = years
            .iter()
            .enumerate()
            .map(|(n, &y)| paper(n, "J", y, "virology"))
            .collect();
        let index = FollowUpIndex::new(list);
        let filtered = index.filter_by_years(2020, None, 2023).unwrap();
        assert_eq!(dois(&filtered), vec!["10.1/0", "10.1/2"]);
    }

    #[test]
    fn test_year_filter_closed_range() {
        let index = FollowUpIndex::new(ranked_list());
        let filtered = index.filter_by_years(2016, Some(2018), 2030).unwrap();
        assert_eq!(dois(&filtered), vec!["10.1/1", "10.1/2", "10.1/3"]);
    }

    #[test]
    fn test_inverted_year_range_is_input_error() {
        let index = FollowUpIndex::new(ranked_list());
        assert!(matches!(
            index.filter_by_years(2020, Some(2010), 2023).unwrap_err(),
            SearchError::Input(_)
        ));
    }

    #[test]
    fn test_facets_first_occurrence_order() {
        let index = FollowUpIndex::new(ranked_list());
        let facets = index.facets();
        assert_eq!(facets.journals, vec!["A", "B", "C", "D"]);
        assert_eq!(facets.pubyears.len(), 10);
        assert_eq!(facets.pubyears[0], 2015);
        assert_eq!(facets.categories, vec!["virology"]);
    }

    #[test]
    fn test_category_filter() {
        let mut list = ranked_list();
        list[3].category = "biochemistry".to_string();
        list[6].category = "biochemistry".to_string();
        let index = FollowUpIndex::new(list);
        let filtered = index.filter_by_categories(&["biochemistry".to_string()]);
        assert_eq!(dois(&filtered), vec!["10.1/3", "10.1/6"]);
    }

    #[test]
    fn test_chained_filters_compose() {
        let index = FollowUpIndex::new(ranked_list());
        let by_journal = index.filter_by_journals(&["A".to_string(), "B".to_string()]);
        let chained = FollowUpIndex::new(by_journal)
            .filter_by_years(2015, Some(2017), 2030)
            .unwrap();
        // Ranks 0,1,2 carry journals A,B,A and years 2015,2016,2017
        assert_eq!(dois(&chained), vec!["10.1/0", "10.1/1", "10.1/2"]);
    }
}
