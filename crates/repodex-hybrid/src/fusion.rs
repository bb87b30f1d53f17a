//! Deterministic score fusion.
//!
//! Each backend's raw scores are min-max normalized within its own result
//! set (never against the other backend, so repeated queries against the
//! same backend state normalize identically). Documents are joined by
//! identity; a document missing from one answered backend gets 0.0 for
//! that subscore, which makes the combined formula total. A backend that
//! did not answer at all contributes nothing: its weight drops out instead
//! of penalizing every candidate.
//!
//! Combined score = `w_kw * kw_norm + w_vec * vec_norm`. Ties break on the
//! subscore of the higher-weighted backend (keyword at equal weights),
//! then on lexicographic relative path.

use std::collections::BTreeMap;

use repodex_core::config::FusionSettings;
use repodex_core::types::{DocId, KeywordHit, SearchResult, VectorHit};

/// Longest snippet taken from a vector chunk when no lexical snippet
/// exists, in characters.
const VECTOR_SNIPPET_CHARS: usize = 240;

#[derive(Default)]
struct Candidate {
    rel_path: String,
    repo: String,
    keyword_score: f32,
    vector_score: f32,
    keyword_snippet: Option<String>,
    vector_text: Option<String>,
}

/// Fuse both result sets into at most `limit` ranked results.
///
/// `None` means the backend did not answer (error/timeout); `Some(vec![])`
/// means it answered with nothing.
pub fn fuse(
    keyword: Option<Vec<KeywordHit>>,
    vector: Option<Vec<VectorHit>>,
    settings: &FusionSettings,
    limit: usize,
) -> Vec<SearchResult> {
    let keyword_answered = keyword.is_some();
    let vector_answered = vector.is_some();
    let mut candidates: BTreeMap<DocId, Candidate> = BTreeMap::new();

    if let Some(hits) = keyword {
        let normalized = min_max(&hits.iter().map(|h| h.score).collect::<Vec<_>>());
        for (hit, score) in hits.into_iter().zip(normalized) {
            let entry = candidates.entry(hit.doc_id).or_default();
            entry.rel_path = hit.rel_path;
            entry.repo = hit.repo;
            entry.keyword_score = score;
            entry.keyword_snippet = hit.snippet;
        }
    }

    if let Some(hits) = vector {
        // Best chunk wins: one highly relevant passage should not be
        // diluted by the rest of an average document.
        let mut best: BTreeMap<DocId, VectorHit> = BTreeMap::new();
        for hit in hits {
            match best.get(&hit.doc_id) {
                Some(prev) if prev.score >= hit.score => {}
                _ => {
                    best.insert(hit.doc_id.clone(), hit);
                }
            }
        }
        let collapsed: Vec<VectorHit> = best.into_values().collect();
        let normalized = min_max(&collapsed.iter().map(|h| h.score).collect::<Vec<_>>());
        for (hit, score) in collapsed.into_iter().zip(normalized) {
            let entry = candidates.entry(hit.doc_id).or_default();
            if entry.rel_path.is_empty() {
                entry.rel_path = hit.rel_path;
                entry.repo = hit.repo;
            }
            entry.vector_score = score;
            entry.vector_text = Some(hit.text);
        }
    }

    let (keyword_weight, vector_weight) = match (keyword_answered, vector_answered) {
        (true, true) => (settings.keyword_weight, settings.vector_weight),
        (true, false) => (1.0, 0.0),
        (false, true) => (0.0, 1.0),
        (false, false) => (0.0, 0.0),
    };

    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .map(|(doc_id, c)| SearchResult {
            doc_id,
            rel_path: c.rel_path,
            repo: c.repo,
            snippet: c
                .keyword_snippet
                .or_else(|| c.vector_text.map(|t| truncate_chars(&t, VECTOR_SNIPPET_CHARS)))
                .unwrap_or_default(),
            keyword_score: c.keyword_score,
            vector_score: c.vector_score,
            score: keyword_weight * c.keyword_score + vector_weight * c.vector_score,
            rank: 0,
        })
        .collect();

    let dominant = |r: &SearchResult| -> f32 {
        if settings.vector_weight > settings.keyword_weight {
            r.vector_score
        } else {
            r.keyword_score
        }
    };
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| dominant(b).total_cmp(&dominant(a)))
            .then_with(|| a.rel_path.cmp(&b.rel_path))
    });
    results.truncate(limit);
    for (rank, result) in results.iter_mut().enumerate() {
        result.rank = rank;
    }
    results
}

/// Scale into [0, 1] within the set. A degenerate set (all scores equal,
/// including a single hit) maps to 1.0 so a lone strong match is not
/// zeroed out.
fn min_max(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if scores.is_empty() || (max - min) <= f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
