use super::RecommendStrategy;
use crate::config::EngineConfig;
use crate::models::{ScoredProduct, Strategy, Transaction};
use crate::services::interaction::IdIndex;
use crate::snapshot::Snapshot;
use crate::utils::rank_top_n;
use tracing::debug;

/// Popularity Ranker - user-agnostic fallback
///
/// score = rating_weight * mean(rating) + frequency_weight * count / max_count
///
/// Products without transactions have no score and are never returned.
/// The full ranking is computed once per snapshot; requests only slice it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PopularityRanker;

impl PopularityRanker {
    pub fn new() -> Self {
        Self
    }

    /// Rank every product with at least one transaction.
    /// Aggregation uses sums and counts only, so input order does not matter.
    pub fn score_products(
        transactions: &[Transaction],
        products: &IdIndex,
        config: &EngineConfig,
    ) -> Vec<ScoredProduct> {
        let mut rating_sum = vec![0.0f64; products.len()];
        let mut counts = vec![0usize; products.len()];

        for tx in transactions {
            if let Some(idx) = products.position(&tx.product_id) {
                rating_sum[idx] += f64::from(tx.rating);
                counts[idx] += 1;
            }
        }

        let max_count = counts.iter().copied().max().unwrap_or(0);
        if max_count == 0 {
            debug!("No transactions available, popularity ranking is empty");
            return Vec::new();
        }

        let scores = counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(idx, count)| {
                let mean_rating = rating_sum[idx] / *count as f64;
                let frequency = *count as f64 / max_count as f64;
                let score = config.popularity_rating_weight * mean_rating
                    + config.popularity_frequency_weight * frequency;
                (idx, score)
            })
            .collect::<Vec<_>>();

        let len = scores.len();
        rank_top_n(scores, len)
    }
}

impl RecommendStrategy for PopularityRanker {
    fn rank(&self, snapshot: &Snapshot, _user_id: &str, limit: usize) -> Vec<ScoredProduct> {
        snapshot.popularity().iter().take(limit).cloned().collect()
    }

    fn source(&self) -> Strategy {
        Strategy::Popular
    }
}
