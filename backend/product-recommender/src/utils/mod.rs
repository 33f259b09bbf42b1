// Vector and ranking helpers shared by the recommendation strategies

use crate::models::ScoredProduct;
use ndarray::{ArrayBase, ArrayView1, Data, Ix1};
use std::cmp::Ordering;

/// Calculate cosine similarity between two vectors.
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(b) / (norm_a * norm_b)
}

/// Normalize vector to unit length (no-op for the zero vector)
pub fn normalize_vector<S>(vec: &mut ArrayBase<S, Ix1>)
where
    S: ndarray::DataMut<Elem = f64>,
{
    let norm = vec.dot(&*vec).sqrt();
    if norm > 0.0 {
        vec.mapv_inplace(|x| x / norm);
    }
}

/// Scores are compared at this resolution so that values equal up to
/// floating-point rounding (e.g. 0.6 * 2 and 0.4 * 3) tie exactly.
pub const SCORE_RESOLUTION: f64 = 1e9;

pub fn quantize_score(score: f64) -> f64 {
    (score * SCORE_RESOLUTION).round() / SCORE_RESOLUTION
}

pub fn is_zero_vector<S: Data<Elem = f64>>(vec: &ArrayBase<S, Ix1>) -> bool {
    vec.iter().all(|x| *x == 0.0)
}

/// Order scored entries by score descending, lower index first on ties,
/// and keep the top `limit`.
pub fn rank_top_n<I>(scores: I, limit: usize) -> Vec<ScoredProduct>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut ranked: Vec<ScoredProduct> = scores
        .into_iter()
        .map(|(index, score)| ScoredProduct { index, score })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.index.cmp(&b.index))
    });
    ranked.truncate(limit);

    ranked
}
