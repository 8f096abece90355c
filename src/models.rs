use serde::{Deserialize, Serialize};

/// A sparse vector over the vocabulary: `(term id, weight)` pairs sorted by
/// term id, zero entries omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector(pub Vec<(u32, f32)>);

impl SparseVector {
    pub fn new(mut entries: Vec<(u32, f32)>) -> Self {
        entries.sort_by_key(|&(id, _)| id);
        SparseVector(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u32, f32)> {
        self.0.iter()
    }

    /// Dot product of two sorted sparse vectors (merge join).
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.0.len() && j < other.0.len() {
            let (a_id, a_w) = self.0[i];
            let (b_id, b_w) = other.0[j];
            match a_id.cmp(&b_id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn l2_norm(&self) -> f32 {
        self.0
            .iter()
            .map(|&(_, w)| w as f64 * w as f64)
            .sum::<f64>()
            .sqrt() as f32
    }

    /// Scales the vector to unit L2 norm. A zero vector is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for entry in &mut self.0 {
                entry.1 /= norm;
            }
        }
    }

    /// Expands into a dense vector of the given length. Ids outside the range
    /// are ignored.
    pub fn to_dense(&self, len: usize) -> Vec<f32> {
        let mut dense = vec![0.0f32; len];
        for &(id, w) in &self.0 {
            if (id as usize) < len {
                dense[id as usize] = w;
            }
        }
        dense
    }
}

/// A bag-of-words: `(term id, raw count)` pairs sorted by term id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagOfWords(pub Vec<(u32, u32)>);

impl BagOfWords {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One author entry as stored in the metadata stream (Unpaywall shape).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
}

/// Paper metadata, one JSON line per document in a shard's metadata stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub doi: String,
    pub title: String,
    #[serde(alias = "url")]
    pub doi_url: String,
    pub journal_name: String,
    pub year: i32,
    #[serde(default)]
    pub z_authors: Vec<Author>,
    #[serde(default)]
    pub category: String,
    #[serde(
        rename = "abstract",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub abstract_text: Option<String>,
}

/// A scored hit before metadata attachment: shard-local docid plus the
/// shard it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub shard: String,
    pub docid: u32,
    pub score: f32,
}

/// The response of a `search` call: scores and metadata in lockstep, ordered
/// by descending score with the (shard, docid) tie-break.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub scores: Vec<f32>,
    pub results: Vec<PaperMetadata>,
}

/// Facet key sets extracted from a ranked result list, each in
/// first-occurrence order (which is descending relevance).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub pubyears: Vec<i32>,
    pub journals: Vec<String>,
    pub categories: Vec<String>,
}

/// Truncates an abstract for display at the first space at or after
/// `limit` characters, appending an ellipsis marker.
pub fn truncate_abstract(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_string();
    }
    let mut position = limit;
    while position < chars.len() && chars[position] != ' ' {
        position += 1;
    }
    if position + 1 >= chars.len() {
        text.to_string()
    } else {
        let head: String = chars[..position].iter().collect();
        format!("{head} ...")
    }
}
