// =============================================================================
// similarity.rs - WHO DOES THIS COMPANY REMIND US OF?
// =============================================================================
//
// Every company that ever got delisted left behind a ratio profile. This
// module lines the current company up against all of them and reports the
// five closest by cosine similarity.
//
// Only dimensions known on BOTH sides count. If fewer than six of the seven
// dimensions overlap, the comparison is considered meaningless and scores 0,
// because two companies that agree on their current ratio and nothing else
// are not "similar" in any useful sense.
//
// Scoring is embarrassingly parallel, so rayon does it. Rayon's indexed
// collect keeps the input order, and the sort is stable, so ties are broken
// by dataset order no matter how many threads ran.
// =============================================================================

use rayon::prelude::*;
use std::cmp::Ordering;

use crate::models::{DistressRecord, RatioField, RatioVector, SimilarityMatch};

/// Minimum number of dimensions that must be known in both vectors.
pub const MIN_SHARED_FIELDS: usize = 6;

/// Maximum number of matches reported.
pub const MAX_MATCHES: usize = 5;

/// Cosine similarity over the dimensions known in both vectors.
///
/// Returns 0 when fewer than [`MIN_SHARED_FIELDS`] dimensions are shared or
/// either side has zero norm over them. The raw value lies in [-1, 1] and
/// is symmetric in its arguments.
///
/// Each side is divided by its largest shared magnitude before summing, so
/// finite inputs never overflow the squares.
pub fn cosine_similarity(a: &RatioVector, b: &RatioVector) -> f64 {
    let pairs: Vec<(f64, f64)> = RatioField::ALL
        .into_iter()
        .filter_map(|field| Some((a.get(field)?, b.get(field)?)))
        .collect();
    if pairs.len() < MIN_SHARED_FIELDS {
        return 0.0;
    }

    let scale_a = pairs.iter().fold(0.0_f64, |m, &(x, _)| m.max(x.abs()));
    let scale_b = pairs.iter().fold(0.0_f64, |m, &(_, y)| m.max(y.abs()));
    if scale_a == 0.0 || scale_b == 0.0 {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for &(x, y) in &pairs {
        let (x, y) = (x / scale_a, y / scale_b);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let value = dot / (norm_a.sqrt() * norm_b.sqrt());
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// The (at most five) delisted companies most similar to `current`, best
/// first. Similarities are clamped into [0, 1].
pub fn find_similar_distressed_companies(
    current: &RatioVector,
    candidates: &[DistressRecord],
) -> Vec<SimilarityMatch> {
    let mut matches: Vec<SimilarityMatch> = candidates
        .par_iter()
        .map(|record| SimilarityMatch {
            ticker: record.ticker.clone(),
            year: record.year.clone(),
            similarity: cosine_similarity(current, &record.ratios).clamp(0.0, 1.0),
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    matches.truncate(MAX_MATCHES);
    matches
}
