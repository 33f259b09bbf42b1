// ============================================
// Hybrid Combiner
// ============================================
//
// Positional rank fusion of the collaborative and content rankings.
// Entry i of a list of length L scores weight * (L - i); a product present
// in both lists gets the sum. Raw scores of the two sources are ignored,
// they live on different scales.

use crate::models::{ScoredProduct, Strategy};
use crate::services::recall::{CollaborativeFilter, ContentFilter, RecommendStrategy};
use crate::snapshot::Snapshot;
use crate::utils::{quantize_score, rank_top_n};
use std::collections::BTreeMap;
use tracing::debug;

/// Positional fusion of two rankings, ties broken by lower product index.
pub fn fuse_rankings(
    collaborative: &[ScoredProduct],
    content: &[ScoredProduct],
    cf_weight: f64,
    cb_weight: f64,
    limit: usize,
) -> Vec<ScoredProduct> {
    let mut combined: BTreeMap<usize, f64> = BTreeMap::new();

    for (list, weight) in [(collaborative, cf_weight), (content, cb_weight)] {
        let len = list.len();
        for (position, entry) in list.iter().enumerate() {
            *combined.entry(entry.index).or_insert(0.0) += weight * (len - position) as f64;
        }
    }

    // Equal positional sums (e.g. 0.6 * 2 and 0.4 * 3) must tie exactly
    let quantized = combined
        .into_iter()
        .map(|(index, score)| (index, quantize_score(score)));

    rank_top_n(quantized, limit)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HybridCombiner {
    collaborative: CollaborativeFilter,
    content: ContentFilter,
}

impl HybridCombiner {
    pub fn new(collaborative: CollaborativeFilter, content: ContentFilter) -> Self {
        Self {
            collaborative,
            content,
        }
    }
}

impl RecommendStrategy for HybridCombiner {
    fn rank(&self, snapshot: &Snapshot, user_id: &str, limit: usize) -> Vec<ScoredProduct> {
        let cf = self.collaborative.rank(snapshot, user_id, limit);
        let cb = self.content.rank(snapshot, user_id, limit);

        let config = snapshot.config();
        let fused = fuse_rankings(&cf, &cb, config.cf_weight, config.cb_weight, limit);

        debug!(
            user_id = %user_id,
            collaborative = cf.len(),
            content = cb.len(),
            fused = fused.len(),
            "Hybrid fusion completed"
        );

        fused
    }

    fn source(&self) -> Strategy {
        Strategy::Hybrid
    }
}
