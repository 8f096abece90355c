use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::errors::Result;
use crate::models::SparseVector;
use crate::search::deadline::Deadline;
use crate::shard::Shard;

/// Rows scanned between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// A scored document inside the bounded heap. Ordering is "better is
/// greater": higher score wins, and at equal score the smaller docid wins,
/// so the heap minimum is always the candidate to evict.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    docid: u32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // NaN scores compare equal rather than poisoning the heap
        match self.score.partial_cmp(&other.score).unwrap_or(Ordering::Equal) {
            Ordering::Equal => other.docid.cmp(&self.docid),
            ordering => ordering,
        }
    }
}

/// Sparse cosine similarity of a query vector against every document in a
/// shard, returning up to `top_k` `(docid, score)` pairs by descending
/// score.
///
/// Both the query and every stored row are L2-normalized, so the cosine is
/// just the sparse dot product. Rows are scanned sequentially off the
/// memory map and fed through a bounded min-heap; scores of zero or below
/// never enter the heap.
pub fn cosine_topk(
    query: &SparseVector,
    shard: &Shard,
    top_k: usize,
    deadline: &Deadline,
) -> Result<Vec<(u32, f32)>> {
    if top_k == 0 || query.is_empty() || shard.is_empty() {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<std::cmp::Reverse<Candidate>> = BinaryHeap::with_capacity(top_k);
    for docid in 0..shard.len() {
        if docid % DEADLINE_CHECK_INTERVAL == 0 {
            deadline.check()?;
        }
        let score = query.dot(&shard.row(docid)?);
        if score <= 0.0 {
            continue;
        }
        let candidate = Candidate {
            score,
            docid: docid as u32,
        };
        if heap.len() < top_k {
            heap.push(std::cmp::Reverse(candidate));
        } else if let Some(worst) = heap.peek() {
            if candidate > worst.0 {
                heap.pop();
                heap.push(std::cmp::Reverse(candidate));
            }
        }
    }

    let mut hits: Vec<(u32, f32)> = heap
        .into_iter()
        .map(|entry| (entry.0.docid, entry.0.score))
        .collect();
    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    Ok(hits)
}
