use crate::error::{RecommendError, Result};
use crate::metrics::RecommenderMetrics;
use crate::models::Strategy;
use crate::services::hybrid::HybridCombiner;
use crate::services::recall::{
    CollaborativeFilter, ContentFilter, PopularityRanker, RecommendStrategy,
};
use crate::snapshot::Snapshot;
use tracing::info;

/// Recommendation facade: validates the request and dispatches to the
/// selected strategy. Holds no data of its own; every call reads the
/// snapshot it is given.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecommendationEngine {
    collaborative: CollaborativeFilter,
    content: ContentFilter,
    popularity: PopularityRanker,
    hybrid: HybridCombiner,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        let collaborative = CollaborativeFilter::new();
        let content = ContentFilter::new();

        Self {
            collaborative,
            content,
            popularity: PopularityRanker::new(),
            hybrid: HybridCombiner::new(collaborative, content),
        }
    }

    fn strategy(&self, strategy: Strategy) -> &dyn RecommendStrategy {
        match strategy {
            Strategy::Hybrid => &self.hybrid,
            Strategy::Collaborative => &self.collaborative,
            Strategy::Content => &self.content,
            Strategy::Popular => &self.popularity,
        }
    }

    /// Ranked product ids for `user_id`, at most `n` long.
    /// An empty result means no recommendation is available.
    pub fn recommend(
        &self,
        snapshot: &Snapshot,
        user_id: &str,
        strategy: Strategy,
        n: usize,
    ) -> Result<Vec<String>> {
        if n == 0 {
            return Err(RecommendError::InvalidRequest(
                "recommendation count must be positive".to_string(),
            ));
        }

        RecommenderMetrics::record_request(strategy.as_str());

        let recommendations = self.strategy(strategy).recommend(snapshot, user_id, n);

        info!(
            user_id = %user_id,
            strategy = %strategy,
            requested = n,
            returned = recommendations.len(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// Same as `recommend`, with the strategy given as a caller tag.
    pub fn recommend_tagged(
        &self,
        snapshot: &Snapshot,
        user_id: &str,
        strategy: &str,
        n: i64,
    ) -> Result<Vec<String>> {
        let strategy: Strategy = strategy.parse()?;
        let n = usize::try_from(n).map_err(|_| {
            RecommendError::InvalidRequest(format!(
                "recommendation count must be positive, got {}",
                n
            ))
        })?;

        self.recommend(snapshot, user_id, strategy, n)
    }
}
